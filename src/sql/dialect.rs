//! Target SQL dialects.
//!
//! The dialect decides which pagination syntax is foreign (and stripped) and
//! how the row cap is written back into the statement.

use crate::models::DatabaseType;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::{
    Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// SQL Server: `SELECT TOP n ...`
    #[default]
    #[value(name = "tsql")]
    TSql,
    /// PostgreSQL, MySQL, SQLite: trailing `LIMIT n`
    #[value(name = "limit")]
    Limit,
}

impl SqlDialect {
    /// The row-limit clause as the model is told to write it.
    pub fn row_limit_clause(&self, row_cap: u32) -> String {
        match self {
            Self::TSql => format!("TOP {}", row_cap),
            Self::Limit => format!("LIMIT {}", row_cap),
        }
    }

    /// Pagination rule included in the system prompt.
    pub fn pagination_rule(&self) -> &'static str {
        match self {
            Self::TSql => "Do not use LIMIT/OFFSET; use only SQL Server's TOP N.",
            Self::Limit => {
                "Do not use TOP or OFFSET ... FETCH; put a single LIMIT N at the end of the query."
            }
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TSql => "T-SQL (SQL Server)",
            Self::Limit => "SQL",
        }
    }

    /// Parser dialect for the AST check.
    pub fn parser_dialect(&self, db_type: Option<DatabaseType>) -> Box<dyn Dialect> {
        match (self, db_type) {
            (Self::TSql, _) => Box::new(MsSqlDialect {}),
            (Self::Limit, Some(DatabaseType::PostgreSQL)) => Box::new(PostgreSqlDialect {}),
            (Self::Limit, Some(DatabaseType::MySQL)) => Box::new(MySqlDialect {}),
            (Self::Limit, Some(DatabaseType::SQLite)) => Box::new(SQLiteDialect {}),
            (Self::Limit, None) => Box::new(GenericDialect {}),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TSql => write!(f, "tsql"),
            Self::Limit => write!(f, "limit"),
        }
    }
}
