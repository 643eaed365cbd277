//! Cached schema snapshot used to ground the prompt.
//!
//! The catalog is read once per process. A failed or empty read degrades to a
//! sentinel text, and the sentinel is cached like a real snapshot.

use crate::db::{DbPool, SchemaInspector};
use crate::error::{AgentError, AgentResult};
use crate::models::{CatalogColumn, SchemaSnapshot};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Snapshot text when the schema has no columns.
pub const NO_COLUMNS: &str = "(no columns)";
/// Snapshot text when the catalog could not be read.
pub const SCHEMA_UNAVAILABLE: &str = "(schema unavailable)";

/// Where catalog rows come from.
pub trait CatalogSource: Send + Sync {
    /// Columns ordered by table, then by position within the table.
    fn catalog_columns(&self) -> impl Future<Output = AgentResult<Vec<CatalogColumn>>> + Send;
}

/// Catalog of one schema, read through a pool.
#[derive(Debug, Clone)]
pub struct PoolCatalog {
    pool: DbPool,
    schema: String,
}

impl PoolCatalog {
    pub fn new(pool: DbPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }
}

impl CatalogSource for PoolCatalog {
    fn catalog_columns(&self) -> impl Future<Output = AgentResult<Vec<CatalogColumn>>> + Send {
        SchemaInspector::catalog_columns(&self.pool, &self.schema)
    }
}

/// Memoizes the rendered snapshot of a [`CatalogSource`].
#[derive(Debug)]
pub struct SchemaSnapshotter<C> {
    source: C,
    max_tables: usize,
    max_columns: usize,
    cache: OnceCell<Arc<str>>,
}

impl<C: CatalogSource> SchemaSnapshotter<C> {
    pub fn new(source: C, max_tables: usize, max_columns: usize) -> Self {
        Self {
            source,
            max_tables,
            max_columns,
            cache: OnceCell::new(),
        }
    }

    /// The snapshot text. Only the first call reads the catalog; concurrent
    /// first callers wait for the same read.
    pub async fn snapshot(&self) -> Arc<str> {
        self.cache
            .get_or_init(|| async { Arc::from(self.render().await) })
            .await
            .clone()
    }

    /// The cached snapshot, if one has been taken.
    pub fn cached(&self) -> Option<Arc<str>> {
        self.cache.get().cloned()
    }

    async fn render(&self) -> String {
        match self.source.catalog_columns().await {
            Ok(rows) => {
                let snapshot = SchemaSnapshot::from_catalog(rows, self.max_tables, self.max_columns);
                if snapshot.is_empty() {
                    warn!("Schema has no columns; prompting without table descriptions");
                    return NO_COLUMNS.to_string();
                }
                info!(tables = snapshot.tables.len(), "Schema snapshot taken");
                snapshot.render()
            }
            Err(e) => {
                let err = AgentError::schema_unavailable(e.to_string());
                warn!(error = %err, "Prompting with the unavailable-schema sentinel");
                SCHEMA_UNAVAILABLE.to_string()
            }
        }
    }
}
