//! CSV bulk loading.
//!
//! Reads a delimited file, infers one SQL type per column, creates or reuses
//! the target table and inserts the rows in batches inside one transaction.

pub mod infer;

pub use infer::{CellValue, ColumnKind, infer_columns};

use crate::db::{DbPool, SchemaInspector};
use crate::error::{AgentError, AgentResult};
use crate::impl_db_dispatch;
use crate::models::DatabaseType;
use clap::ValueEnum;
use serde::Serialize;
use sqlx::QueryBuilder;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Default number of rows per INSERT.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    #[default]
    Append,
    Replace,
    Fail,
}

impl fmt::Display for IfExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::Replace => write!(f, "replace"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// A parsed CSV file: header names and raw cells.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl CsvTable {
    /// Read `path` with the given single-byte delimiter. The first record is
    /// the header.
    pub fn read(path: &Path, delimiter: u8) -> AgentResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_path(path)?;
        Self::from_reader(&mut reader)
    }

    /// Parse CSV text already in memory.
    pub fn parse(data: &str, delimiter: u8) -> AgentResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(data.as_bytes());
        Self::from_reader(&mut reader)
    }

    fn from_reader<R: std::io::Read>(reader: &mut csv::Reader<R>) -> AgentResult<Self> {
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(AgentError::load("CSV has no header row"));
        }
        if let Some(pos) = headers.iter().position(String::is_empty) {
            return Err(AgentError::load(format!("CSV column {} has an empty name", pos + 1)));
        }

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(record.iter().map(String::from).collect());
        }

        Ok(Self { headers, records })
    }

    pub fn column_kinds(&self) -> Vec<ColumnKind> {
        infer_columns(self.headers.len(), &self.records)
    }
}

/// Where and how to load a [`CsvTable`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub table: String,
    pub schema: String,
    pub if_exists: IfExists,
    pub chunk_size: usize,
}

/// Outcome of a load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Quoted, schema-qualified table name.
    pub table: String,
    pub inserted: u64,
    /// `COUNT(*)` of the table after the load.
    pub total_rows: i64,
}

/// Statements and rows for one load, independent of the backend.
#[derive(Debug)]
struct LoadPlan {
    drop_table: Option<String>,
    create_table: Option<String>,
    insert_head: String,
    rows: Vec<Vec<CellValue>>,
    batch_rows: usize,
}

/// Load `csv` into the table named by `options`.
pub async fn load(pool: &DbPool, csv: &CsvTable, options: &LoadOptions) -> AgentResult<LoadReport> {
    let db_type = pool.db_type();
    let qualified = db_type.qualify(&options.schema, &options.table);
    let kinds = csv.column_kinds();

    let exists = SchemaInspector::table_exists(pool, &options.schema, &options.table).await?;
    if exists && options.if_exists == IfExists::Fail {
        return Err(AgentError::load(format!("table {} already exists", qualified)));
    }

    let plan = plan_load(db_type, &qualified, csv, &kinds, options, exists)?;
    info!(
        table = %qualified,
        rows = plan.rows.len(),
        columns = csv.headers.len(),
        if_exists = %options.if_exists,
        "Loading CSV"
    );

    let inserted = impl_db_dispatch!(pool, {
        MySql(p) => mysql::run(p, &plan).await,
        Postgres(p) => postgres::run(p, &plan).await,
        SQLite(p) => sqlite::run(p, &plan).await,
    })?;

    let total_rows = SchemaInspector::count_rows(pool, &qualified).await?;
    Ok(LoadReport {
        table: qualified,
        inserted,
        total_rows,
    })
}

fn plan_load(
    db_type: DatabaseType,
    qualified: &str,
    csv: &CsvTable,
    kinds: &[ColumnKind],
    options: &LoadOptions,
    exists: bool,
) -> AgentResult<LoadPlan> {
    let column_defs = csv
        .headers
        .iter()
        .zip(kinds)
        .map(|(name, kind)| format!("{} {}", db_type.quote_ident(name), kind.ddl_type(db_type)))
        .collect::<Vec<_>>()
        .join(", ");
    let create = format!("CREATE TABLE {} ({})", qualified, column_defs);

    let (drop_table, create_table) = match (exists, options.if_exists) {
        (true, IfExists::Replace) => (Some(format!("DROP TABLE {}", qualified)), Some(create)),
        (true, _) => (None, None),
        (false, _) => (None, Some(create)),
    };

    let column_list = csv
        .headers
        .iter()
        .map(|h| db_type.quote_ident(h))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_head = format!("INSERT INTO {} ({}) ", qualified, column_list);

    let mut rows = Vec::with_capacity(csv.records.len());
    for (index, record) in csv.records.iter().enumerate() {
        if record.len() != kinds.len() {
            return Err(AgentError::load(format!(
                "record {} has {} fields, expected {}",
                index + 1,
                record.len(),
                kinds.len()
            )));
        }
        let row = kinds
            .iter()
            .zip(record)
            .map(|(kind, cell)| kind.convert(cell))
            .collect::<AgentResult<Vec<_>>>()?;
        rows.push(row);
    }

    let batch_rows = batch_rows(db_type, kinds.len(), options.chunk_size);
    debug!(batch_rows = batch_rows, "Planned insert batches");

    Ok(LoadPlan {
        drop_table,
        create_table,
        insert_head,
        rows,
        batch_rows,
    })
}

/// Rows per INSERT: the requested chunk size, reduced so one statement stays
/// under the driver's bind-parameter limit.
fn batch_rows(db_type: DatabaseType, columns: usize, chunk_size: usize) -> usize {
    let max_params = match db_type {
        DatabaseType::PostgreSQL | DatabaseType::MySQL => 65_535,
        DatabaseType::SQLite => 32_766,
    };
    chunk_size.min(max_params / columns.max(1)).max(1)
}

/// Bind every cell of `row` into an open VALUES tuple.
macro_rules! push_row {
    ($b:ident, $row:expr) => {
        for cell in $row {
            match cell {
                CellValue::Int(v) => {
                    $b.push_bind(*v);
                }
                CellValue::Float(v) => {
                    $b.push_bind(*v);
                }
                CellValue::Bool(v) => {
                    $b.push_bind(*v);
                }
                CellValue::Timestamp(v) => {
                    $b.push_bind(*v);
                }
                CellValue::Text(v) => {
                    $b.push_bind(v.clone());
                }
            }
        }
    };
}

// Each module below runs a LoadPlan inside one transaction on its backend.

mod mysql {
    use super::*;
    use sqlx::{MySql, MySqlPool};

    pub async fn run(pool: &MySqlPool, plan: &LoadPlan) -> AgentResult<u64> {
        let mut tx = pool.begin().await?;
        // DDL commits implicitly on MySQL; only the inserts are transactional.
        if let Some(sql) = &plan.drop_table {
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        if let Some(sql) = &plan.create_table {
            sqlx::query(sql).execute(&mut *tx).await?;
        }

        let mut inserted = 0;
        for chunk in plan.rows.chunks(plan.batch_rows) {
            let mut builder: QueryBuilder<'_, MySql> = QueryBuilder::new(&plan.insert_head);
            builder.push_values(chunk, |mut b, row| push_row!(b, row));
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgPool, Postgres};

    pub async fn run(pool: &PgPool, plan: &LoadPlan) -> AgentResult<u64> {
        let mut tx = pool.begin().await?;
        if let Some(sql) = &plan.drop_table {
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        if let Some(sql) = &plan.create_table {
            sqlx::query(sql).execute(&mut *tx).await?;
        }

        let mut inserted = 0;
        for chunk in plan.rows.chunks(plan.batch_rows) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(&plan.insert_head);
            builder.push_values(chunk, |mut b, row| push_row!(b, row));
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Sqlite, SqlitePool};

    pub async fn run(pool: &SqlitePool, plan: &LoadPlan) -> AgentResult<u64> {
        let mut tx = pool.begin().await?;
        if let Some(sql) = &plan.drop_table {
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        if let Some(sql) = &plan.create_table {
            sqlx::query(sql).execute(&mut *tx).await?;
        }

        let mut inserted = 0;
        for chunk in plan.rows.chunks(plan.batch_rows) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(&plan.insert_head);
            builder.push_values(chunk, |mut b, row| push_row!(b, row));
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(if_exists: IfExists) -> LoadOptions {
        LoadOptions {
            table: "products".to_string(),
            schema: "main".to_string(),
            if_exists,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    #[test]
    fn test_parse_csv() {
        let csv = CsvTable::parse("id;name\n1;apple\n2;pear\n", b';').unwrap();
        assert_eq!(csv.headers, vec!["id", "name"]);
        assert_eq!(csv.records.len(), 2);
        assert_eq!(csv.column_kinds()[0], ColumnKind::Integer);
    }

    #[test]
    fn test_parse_rejects_blank_header() {
        let result = CsvTable::parse("id,,name\n1,2,3\n", b',');
        assert!(matches!(result, Err(AgentError::Load { .. })));
    }

    #[test]
    fn test_plan_new_table() {
        let csv = CsvTable::parse("id,name\n1,apple\n", b',').unwrap();
        let kinds = csv.column_kinds();
        let plan = plan_load(
            DatabaseType::SQLite,
            "\"main\".\"products\"",
            &csv,
            &kinds,
            &options(IfExists::Append),
            false,
        )
        .unwrap();

        assert!(plan.drop_table.is_none());
        assert_eq!(
            plan.create_table.as_deref(),
            Some("CREATE TABLE \"main\".\"products\" (\"id\" INTEGER, \"name\" VARCHAR(16))")
        );
        assert_eq!(
            plan.insert_head,
            "INSERT INTO \"main\".\"products\" (\"id\", \"name\") "
        );
        assert_eq!(
            plan.rows[0],
            vec![CellValue::Int(Some(1)), CellValue::Text(Some("apple".to_string()))]
        );
    }

    #[test]
    fn test_plan_existing_table() {
        let csv = CsvTable::parse("id\n1\n", b',').unwrap();
        let kinds = csv.column_kinds();

        let append = plan_load(DatabaseType::SQLite, "t", &csv, &kinds, &options(IfExists::Append), true)
            .unwrap();
        assert!(append.drop_table.is_none());
        assert!(append.create_table.is_none());

        let replace =
            plan_load(DatabaseType::SQLite, "t", &csv, &kinds, &options(IfExists::Replace), true)
                .unwrap();
        assert_eq!(replace.drop_table.as_deref(), Some("DROP TABLE t"));
        assert!(replace.create_table.is_some());
    }

    #[test]
    fn test_plan_rejects_ragged_record() {
        let csv = CsvTable {
            headers: vec!["a".to_string(), "b".to_string()],
            records: vec![vec!["1".to_string()]],
        };
        let kinds = vec![ColumnKind::Integer, ColumnKind::Integer];
        let result = plan_load(DatabaseType::SQLite, "t", &csv, &kinds, &options(IfExists::Append), false);
        assert!(matches!(result, Err(AgentError::Load { .. })));
    }

    #[test]
    fn test_batch_rows_respects_bind_limit() {
        assert_eq!(batch_rows(DatabaseType::SQLite, 2, 5000), 5000);
        assert_eq!(batch_rows(DatabaseType::SQLite, 10, 5000), 3276);
        assert_eq!(batch_rows(DatabaseType::PostgreSQL, 100, 5000), 655);
        assert_eq!(batch_rows(DatabaseType::MySQL, 3, 0), 1);
    }
}
