//! Query execution engine.
//!
//! Sanitized statements run inside a transaction that is always rolled back,
//! under a timeout, and at most `row_cap + 1` rows are pulled from the result
//! stream so the executor can tell whether the result was truncated.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules
//! (`mysql`, `postgres`, `sqlite`), each providing the same interface.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{AgentError, AgentResult};
use crate::models::{DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_CAP, MAX_ROW_CAP, QueryResult};
use crate::sql::SanitizedQuery;
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs sanitized statements against a pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    query_timeout: Duration,
    row_cap: u32,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            row_cap: DEFAULT_ROW_CAP,
        }
    }

    /// Create a query executor with a custom timeout and row cap.
    /// The cap is clamped to `[1, MAX_ROW_CAP]`.
    pub fn with_limits(query_timeout: Duration, row_cap: u32) -> Self {
        Self {
            query_timeout,
            row_cap: row_cap.clamp(1, MAX_ROW_CAP),
        }
    }

    pub fn row_cap(&self) -> u32 {
        self.row_cap
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Execute a sanitized statement and return at most `row_cap` rows.
    pub async fn execute(&self, pool: &DbPool, query: &SanitizedQuery) -> AgentResult<QueryResult> {
        let start = Instant::now();
        let sql = query.as_str();
        let fetch_limit = self.row_cap as usize + 1;

        debug!(
            sql = %sql,
            row_cap = self.row_cap,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        impl_db_dispatch!(pool, {
            MySql(p) => {
                let rows = with_timeout(self.query_timeout, mysql::fetch_rows(p, sql, fetch_limit)).await?;
                Ok(process_rows(sql, rows, self.row_cap, start))
            },
            Postgres(p) => {
                let rows = with_timeout(self.query_timeout, postgres::fetch_rows(p, sql, fetch_limit)).await?;
                Ok(process_rows(sql, rows, self.row_cap, start))
            },
            SQLite(p) => {
                let rows = with_timeout(self.query_timeout, sqlite::fetch_rows(p, sql, fetch_limit)).await?;
                Ok(process_rows(sql, rows, self.row_cap, start))
            },
        })
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn fetched rows into a QueryResult, keeping at most `row_cap` of them.
fn process_rows<R: RowToJson>(sql: &str, rows: Vec<R>, row_cap: u32, start: Instant) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    let Some(first) = rows.first() else {
        return QueryResult::empty(sql, execution_time_ms);
    };

    let columns = first.column_names();
    let total_rows = rows.len();
    let truncated = total_rows > row_cap as usize;

    let json_rows = rows
        .iter()
        .take(row_cap as usize)
        .map(|r| r.to_json_map())
        .collect();

    if truncated {
        warn!(row_cap = row_cap, "Query result truncated");
    }

    QueryResult {
        sql: sql.to_string(),
        columns,
        rows: json_rows,
        truncated,
        execution_time_ms,
    }
}

async fn with_timeout<T>(
    query_timeout: Duration,
    work: impl std::future::Future<Output = AgentResult<T>>,
) -> AgentResult<T> {
    match timeout(query_timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::timeout(
            "query execution",
            query_timeout.as_secs() as u32,
        )),
    }
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> AgentResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(AgentError::from)?);
    }
    Ok(rows)
}

// Each module below provides the same interface adapted to its database type.

mod mysql {
    use super::*;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        fetch_limit: usize,
    ) -> AgentResult<Vec<MySqlRow>> {
        use sqlx::Executor;

        let mut tx = pool.begin().await?;
        // No bind parameters: the statement text is sent as-is.
        let results = (&mut *tx)
            .fetch(sql)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await;
        tx.rollback().await?;
        collect_rows(results)
    }
}

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        fetch_limit: usize,
    ) -> AgentResult<Vec<PgRow>> {
        use sqlx::Executor;

        let mut tx = pool.begin().await?;
        (&mut *tx).execute("SET TRANSACTION READ ONLY").await?;
        let results = (&mut *tx)
            .fetch(sql)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await;
        tx.rollback().await?;
        collect_rows(results)
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        fetch_limit: usize,
    ) -> AgentResult<Vec<SqliteRow>> {
        use sqlx::Executor;

        let mut tx = pool.begin().await?;
        let results = (&mut *tx)
            .fetch(sql)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await;
        tx.rollback().await?;
        collect_rows(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_defaults() {
        let executor = QueryExecutor::new();
        assert_eq!(executor.row_cap(), DEFAULT_ROW_CAP);
        assert_eq!(
            executor.query_timeout(),
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_executor_cap_clamped() {
        let executor = QueryExecutor::with_limits(Duration::from_secs(1), MAX_ROW_CAP + 1);
        assert_eq!(executor.row_cap(), MAX_ROW_CAP);

        let executor = QueryExecutor::with_limits(Duration::from_secs(1), 0);
        assert_eq!(executor.row_cap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AgentError>(())
        };
        let err = with_timeout(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout { .. }));
    }
}
