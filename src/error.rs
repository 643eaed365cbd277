//! Error types for the SQL agent.
//!
//! This module defines all error types using `thiserror`. Every failure in the
//! question-to-result pipeline ends up as one of these variants, and each one
//! renders to a single user-visible message at the HTTP boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Schema unavailable: {message}")]
    SchemaUnavailable { message: String },

    #[error("Completion service error: {message}")]
    Completion {
        message: String,
        /// HTTP status returned by the service, when it answered at all
        status: Option<u16>,
    },

    #[error("The model did not return a SELECT statement: {message}")]
    NotASelect { message: String },

    #[error("Statement not allowed: {operation}. {reason}")]
    DisallowedStatement { operation: String, reason: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Database error: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Load failed: {message}")]
    Load { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AgentError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a schema-unavailable error.
    pub fn schema_unavailable(message: impl Into<String>) -> Self {
        Self::SchemaUnavailable {
            message: message.into(),
        }
    }

    /// Create a completion service error.
    pub fn completion(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Completion {
            message: message.into(),
            status,
        }
    }

    pub fn not_a_select(message: impl Into<String>) -> Self {
        Self::NotASelect {
            message: message.into(),
        }
    }

    pub fn disallowed_statement(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DisallowedStatement {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Execution { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// True when the generated SQL was refused before reaching the database.
    pub fn is_rejected_sql(&self) -> bool {
        matches!(
            self,
            Self::NotASelect { .. } | Self::DisallowedStatement { .. } | Self::InvalidQuery { .. }
        )
    }

    /// HTTP status used when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::NotASelect { .. } | Self::DisallowedStatement { .. } | Self::InvalidQuery { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Completion { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Database errors carry their SQLSTATE.
    pub fn detail(&self) -> String {
        match self {
            Self::Execution {
                message,
                sql_state: Some(code),
                ..
            } => format!("Database error: {} (SQLSTATE: {})", message, code),
            _ => self.to_string(),
        }
    }
}

/// Convert sqlx errors to AgentError.
impl From<sqlx::Error> for AgentError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => AgentError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                AgentError::execution(
                    db_err.message(),
                    code,
                    "Check the generated SQL and the referenced tables",
                )
            }
            sqlx::Error::RowNotFound => AgentError::execution(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => AgentError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                AgentError::connection("Connection pool is closed", "Restart the service")
            }
            sqlx::Error::Io(io_err) => AgentError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => AgentError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => AgentError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => AgentError::execution(
                format!("Column not found: {}", col),
                None,
                "Check the column names against the schema",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                AgentError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                AgentError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => AgentError::internal("Database worker crashed"),
            _ => AgentError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        AgentError::completion(err.to_string(), status)
    }
}

impl From<csv::Error> for AgentError {
    fn from(err: csv::Error) -> Self {
        AgentError::load(format!("CSV error: {}", err))
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Render the error as `{"detail": "..."}`, the shape the chat page reads.
impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "detail": self.detail() }));
        (status, body).into_response()
    }
}
