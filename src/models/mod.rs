//! Data models for the SQL agent.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{
    AskRequest, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_CAP, MAX_ROW_CAP, QueryResult,
};
pub use schema::{CatalogColumn, SchemaSnapshot, TableDescriptor};
