//! Query-related data models.
//!
//! This module defines the request and result types that cross the HTTP
//! boundary of the `/ask` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Row cap injected into every generated query.
pub const DEFAULT_ROW_CAP: u32 = 50;

/// Maximum row cap accepted from configuration.
pub const MAX_ROW_CAP: u32 = 10000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Body of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// Result of running a sanitized statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The statement that was executed, exactly as sent to the database.
    pub sql: String,
    /// Column names in projection order. Empty when no rows came back.
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// True if the database produced more rows than the cap.
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create an empty result for a statement that returned no rows.
    pub fn empty(sql: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            sql: sql.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            truncated: false,
            execution_time_ms,
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::empty("SELECT 1 LIMIT 50;", 3);
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
        assert!(!result.truncated);
    }

    #[test]
    fn test_query_result_serializes_ask_shape() {
        let mut row = serde_json::Map::new();
        row.insert("id".to_string(), JsonValue::from(1));
        let result = QueryResult {
            sql: "SELECT TOP 50 id FROM dbo.t;".to_string(),
            columns: vec!["id".to_string()],
            rows: vec![row],
            truncated: false,
            execution_time_ms: 4,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["sql"], "SELECT TOP 50 id FROM dbo.t;");
        assert_eq!(json["columns"][0], "id");
        assert_eq!(json["rows"][0]["id"], 1);
    }

    #[test]
    fn test_ask_request_deserialize() {
        let req: AskRequest = serde_json::from_str(r#"{"question":"How many orders?"}"#).unwrap();
        assert_eq!(req.question, "How many orders?");
    }
}
