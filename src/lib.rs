//! SQL Agent Library
//!
//! Turns natural-language questions into bounded, read-only SQL with the help
//! of a chat-completion model, runs the SQL and returns the rows. Also ships
//! a CSV bulk loader and a connectivity check for the same databases
//! (SQLite, PostgreSQL, MySQL).

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod loader;
pub mod models;
pub mod server;
pub mod snapshot;
pub mod sql;

pub use agent::{Agent, AgentOptions};
pub use config::Config;
pub use error::{AgentError, AgentResult};
