//! Schema introspection module.
//!
//! Reads the column catalog that grounds the prompt, plus the small lookups
//! the loader and the smoke test need.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Database-specific implementations are in their respective
//! submodules (postgres, mysql, sqlite), each providing the same interface.

use crate::db::pool::DbPool;
use crate::error::AgentResult;
use crate::models::CatalogColumn;
use tracing::debug;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Every column of every table and view in `schema`, ordered by table
    /// name then column position. SQLite ignores `schema` and reports `main`.
    pub async fn catalog_columns(pool: &DbPool, schema: &str) -> AgentResult<Vec<CatalogColumn>> {
        let columns = impl_db_dispatch!(pool, {
            MySql(p) => mysql::catalog_columns(p, schema).await,
            Postgres(p) => postgres::catalog_columns(p, schema).await,
            SQLite(p) => sqlite::catalog_columns(p).await,
        })?;
        debug!(schema = %schema, count = columns.len(), "Read column catalog");
        Ok(columns)
    }

    /// Up to `limit` base table names in `schema`, alphabetically.
    pub async fn list_tables(pool: &DbPool, schema: &str, limit: i64) -> AgentResult<Vec<String>> {
        impl_db_dispatch!(pool, {
            MySql(p) => mysql::list_tables(p, schema, limit).await,
            Postgres(p) => postgres::list_tables(p, schema, limit).await,
            SQLite(p) => sqlite::list_tables(p, limit).await,
        })
    }

    /// Whether a base table named `table` exists in `schema`.
    pub async fn table_exists(pool: &DbPool, schema: &str, table: &str) -> AgentResult<bool> {
        let count = impl_db_dispatch!(pool, {
            MySql(p) => sqlx::query_scalar::<_, i64>(queries::mysql::TABLE_EXISTS)
                .bind(schema)
                .bind(table)
                .fetch_one(p)
                .await?,
            Postgres(p) => sqlx::query_scalar::<_, i64>(queries::postgres::TABLE_EXISTS)
                .bind(schema)
                .bind(table)
                .fetch_one(p)
                .await?,
            SQLite(p) => sqlx::query_scalar::<_, i64>(queries::sqlite::TABLE_EXISTS)
                .bind(table)
                .fetch_one(p)
                .await?,
        });
        Ok(count > 0)
    }

    /// `COUNT(*)` of an already quoted, qualified table name.
    pub async fn count_rows(pool: &DbPool, qualified_table: &str) -> AgentResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualified_table);
        let count = impl_db_dispatch!(pool, {
            MySql(p) => sqlx::query_scalar::<_, i64>(&sql).fetch_one(p).await?,
            Postgres(p) => sqlx::query_scalar::<_, i64>(&sql).fetch_one(p).await?,
            SQLite(p) => sqlx::query_scalar::<_, i64>(&sql).fetch_one(p).await?,
        });
        Ok(count)
    }
}

mod queries {
    pub mod postgres {
        pub const CATALOG_COLUMNS: &str = r#"
            SELECT
                table_schema::text AS schema_name,
                table_name::text AS table_name,
                column_name::text AS column_name,
                data_type::text AS data_type
            FROM information_schema.columns
            WHERE table_schema = $1
            ORDER BY table_name, ordinal_position
            "#;

        pub const LIST_TABLES: &str = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            LIMIT $2
            "#;

        pub const TABLE_EXISTS: &str = r#"
            SELECT COUNT(*)
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_name = $2
            "#;
    }

    pub mod mysql {
        pub const CATALOG_COLUMNS: &str = r#"
            SELECT
                TABLE_SCHEMA AS schema_name,
                TABLE_NAME AS table_name,
                COLUMN_NAME AS column_name,
                DATA_TYPE AS data_type
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME, ORDINAL_POSITION
            "#;

        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            LIMIT ?
            "#;

        pub const TABLE_EXISTS: &str = r#"
            SELECT COUNT(*)
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            "#;
    }

    pub mod sqlite {
        pub const CATALOG_COLUMNS: &str = r#"
            SELECT
                'main' AS schema_name,
                m.name AS table_name,
                p.name AS column_name,
                p.type AS data_type
            FROM sqlite_master m
            JOIN pragma_table_info(m.name) p
            WHERE m.type IN ('table', 'view') AND m.name NOT LIKE 'sqlite_%'
            ORDER BY m.name, p.cid
            "#;

        pub const LIST_TABLES: &str = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            LIMIT ?
            "#;

        pub const TABLE_EXISTS: &str = r#"
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table' AND name = ?
            "#;
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn catalog_columns(pool: &PgPool, schema: &str) -> AgentResult<Vec<CatalogColumn>> {
        let rows = sqlx::query(queries::postgres::CATALOG_COLUMNS)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                CatalogColumn::new(
                    row.get::<String, _>("schema_name"),
                    row.get::<String, _>("table_name"),
                    row.get::<String, _>("column_name"),
                    row.get::<String, _>("data_type"),
                )
            })
            .collect())
    }

    pub async fn list_tables(pool: &PgPool, schema: &str, limit: i64) -> AgentResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(queries::postgres::LIST_TABLES)
            .bind(schema)
            .bind(limit)
            .fetch_all(pool)
            .await?)
    }
}

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;
    use sqlx::{MySqlPool, Row};

    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_string(row: &MySqlRow, column: &str) -> String {
        row.try_get::<String, _>(column)
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(column)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .unwrap_or_default()
    }

    pub async fn catalog_columns(
        pool: &MySqlPool,
        schema: &str,
    ) -> AgentResult<Vec<CatalogColumn>> {
        let rows = sqlx::query(queries::mysql::CATALOG_COLUMNS)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                CatalogColumn::new(
                    get_string(row, "schema_name"),
                    get_string(row, "table_name"),
                    get_string(row, "column_name"),
                    get_string(row, "data_type"),
                )
            })
            .collect())
    }

    pub async fn list_tables(
        pool: &MySqlPool,
        schema: &str,
        limit: i64,
    ) -> AgentResult<Vec<String>> {
        let rows = sqlx::query(queries::mysql::LIST_TABLES)
            .bind(schema)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| get_string(row, "TABLE_NAME"))
            .filter(|name| !name.is_empty())
            .collect())
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn catalog_columns(pool: &SqlitePool) -> AgentResult<Vec<CatalogColumn>> {
        let rows = sqlx::query(queries::sqlite::CATALOG_COLUMNS)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                CatalogColumn::new(
                    row.get::<String, _>("schema_name"),
                    row.get::<String, _>("table_name"),
                    row.get::<String, _>("column_name"),
                    // Columns declared without a type have an empty type
                    row.try_get::<String, _>("data_type").unwrap_or_default(),
                )
            })
            .collect())
    }

    pub async fn list_tables(pool: &SqlitePool, limit: i64) -> AgentResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(queries::sqlite::LIST_TABLES)
            .bind(limit)
            .fetch_all(pool)
            .await?)
    }
}
