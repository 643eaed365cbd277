//! Database access layer.
//!
//! - `pool`: per-backend connection pools
//! - `executor`: bounded, rolled-back execution of sanitized statements
//! - `schema`: catalog introspection
//! - `types`: row decoding to JSON
//! - `macros`: backend dispatch

#[macro_use]
pub mod macros;
pub mod executor;
pub mod pool;
pub mod schema;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::DbPool;
pub use schema::SchemaInspector;
