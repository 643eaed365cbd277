//! Connection-related data models.
//!
//! This module defines the database backend type and connection configuration.

use crate::config::PoolOptions;
use crate::sql::SqlDialect;
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Schema used to qualify bare table names when none is configured.
    ///
    /// MySQL has no schema separate from the database, so the database name
    /// from the URL is used there.
    pub fn default_schema(&self, database: Option<&str>) -> Option<String> {
        match self {
            Self::PostgreSQL => Some("public".to_string()),
            Self::MySQL => database.map(String::from),
            Self::SQLite => Some("main".to_string()),
        }
    }

    /// SQL dialect the sanitizer targets for this backend.
    pub fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::Limit
    }

    /// Quote an identifier for this backend, doubling embedded quote characters.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::MySQL => format!("`{}`", ident.replace('`', "``")),
            Self::PostgreSQL | Self::SQLite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quote a `schema.table` pair.
    pub fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for a database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    /// The gateway connects read-only; only the CSV loader opens writable connections.
    #[serde(default)]
    pub writable: bool,
    /// Database name extracted from the connection URL.
    pub database: Option<String>,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    /// Create a new connection configuration.
    pub fn new(
        connection_string: impl Into<String>,
        writable: bool,
        database: Option<String>,
        pool_options: PoolOptions,
    ) -> Result<Self, ConnectionConfigError> {
        let connection_string = connection_string.into();

        if connection_string.trim().is_empty() {
            return Err(ConnectionConfigError::Empty);
        }

        let db_type = DatabaseType::from_connection_string(&connection_string)
            .ok_or_else(|| ConnectionConfigError::UnknownDatabaseType(connection_string.clone()))?;

        Ok(Self {
            db_type,
            connection_string,
            writable,
            database,
            pool_options,
        })
    }

    /// Default schema for this connection (see [`DatabaseType::default_schema`]).
    pub fn default_schema(&self) -> Option<String> {
        self.db_type.default_schema(self.database.as_deref())
    }

    /// Get a display-safe version of the connection string (password masked).
    pub fn masked_connection_string(&self) -> String {
        match Url::parse(&self.connection_string) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("****"));
                url.to_string()
            }
            _ => self.connection_string.clone(),
        }
    }
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Connection string cannot be empty")]
    Empty,

    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),
}
