//! Column type inference for CSV data.
//!
//! Every non-empty cell of a column is checked against the candidate kinds in
//! order (integer, float, boolean, timestamp); the first kind that accepts all
//! of them wins, otherwise the column is text.

use crate::error::{AgentError, AgentResult};
use crate::models::DatabaseType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Shortest VARCHAR length used for text columns.
const MIN_TEXT_LEN: usize = 16;
/// Longer text columns are declared unbounded.
const MAX_VARCHAR_LEN: usize = 4000;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Inferred type of a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Timestamp,
    /// `None` means unbounded text.
    Text { max_len: Option<usize> },
}

impl ColumnKind {
    /// Column type used in `CREATE TABLE` for `db_type`.
    pub fn ddl_type(&self, db_type: DatabaseType) -> String {
        match (self, db_type) {
            (Self::Integer, DatabaseType::SQLite) => "INTEGER".to_string(),
            (Self::Integer, _) => "BIGINT".to_string(),
            (Self::Float, DatabaseType::PostgreSQL) => "DOUBLE PRECISION".to_string(),
            (Self::Float, DatabaseType::MySQL) => "DOUBLE".to_string(),
            (Self::Float, DatabaseType::SQLite) => "REAL".to_string(),
            (Self::Boolean, _) => "BOOLEAN".to_string(),
            (Self::Timestamp, DatabaseType::MySQL) => "DATETIME(6)".to_string(),
            (Self::Timestamp, _) => "TIMESTAMP".to_string(),
            (Self::Text { max_len: Some(n) }, _) => format!("VARCHAR({})", n),
            (Self::Text { max_len: None }, DatabaseType::MySQL) => "LONGTEXT".to_string(),
            (Self::Text { max_len: None }, _) => "TEXT".to_string(),
        }
    }

    /// Convert one cell to a bindable value. Blank cells are NULL.
    pub fn convert(&self, cell: &str) -> AgentResult<CellValue> {
        let trimmed = cell.trim();
        let blank = trimmed.is_empty();
        let invalid =
            || AgentError::load(format!("value '{}' does not fit column type {:?}", cell, self));

        Ok(match self {
            Self::Integer if blank => CellValue::Int(None),
            Self::Integer => CellValue::Int(Some(trimmed.parse().map_err(|_| invalid())?)),
            Self::Float if blank => CellValue::Float(None),
            Self::Float => CellValue::Float(Some(parse_float(trimmed).ok_or_else(invalid)?)),
            Self::Boolean if blank => CellValue::Bool(None),
            Self::Boolean => CellValue::Bool(Some(parse_bool(trimmed).ok_or_else(invalid)?)),
            Self::Timestamp if blank => CellValue::Timestamp(None),
            Self::Timestamp => {
                CellValue::Timestamp(Some(parse_timestamp(trimmed).ok_or_else(invalid)?))
            }
            Self::Text { .. } if blank => CellValue::Text(None),
            Self::Text { .. } => CellValue::Text(Some(cell.to_string())),
        })
    }
}

/// A typed cell ready to be bound into an INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    Timestamp(Option<NaiveDateTime>),
    Text(Option<String>),
}

/// Accumulates what the cells of one column could be.
#[derive(Debug, Clone)]
pub struct ColumnInference {
    integer: bool,
    float: bool,
    boolean: bool,
    timestamp: bool,
    max_len: usize,
    non_empty: usize,
}

impl Default for ColumnInference {
    fn default() -> Self {
        Self {
            integer: true,
            float: true,
            boolean: true,
            timestamp: true,
            max_len: 0,
            non_empty: 0,
        }
    }
}

impl ColumnInference {
    pub fn observe(&mut self, cell: &str) {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return;
        }
        self.non_empty += 1;
        self.max_len = self.max_len.max(cell.chars().count());

        if self.integer && trimmed.parse::<i64>().is_err() {
            self.integer = false;
        }
        if self.float && parse_float(trimmed).is_none() {
            self.float = false;
        }
        if self.boolean && parse_bool(trimmed).is_none() {
            self.boolean = false;
        }
        if self.timestamp && parse_timestamp(trimmed).is_none() {
            self.timestamp = false;
        }
    }

    pub fn finish(&self) -> ColumnKind {
        if self.non_empty == 0 {
            return ColumnKind::Text {
                max_len: Some(MIN_TEXT_LEN),
            };
        }
        if self.integer {
            ColumnKind::Integer
        } else if self.float {
            ColumnKind::Float
        } else if self.boolean {
            ColumnKind::Boolean
        } else if self.timestamp {
            ColumnKind::Timestamp
        } else {
            ColumnKind::Text {
                max_len: text_length(self.max_len),
            }
        }
    }
}

/// Infer one kind per column of `records`.
pub fn infer_columns(column_count: usize, records: &[Vec<String>]) -> Vec<ColumnKind> {
    let mut columns = vec![ColumnInference::default(); column_count];
    for record in records {
        for (column, cell) in columns.iter_mut().zip(record) {
            column.observe(cell);
        }
    }
    columns.iter().map(ColumnInference::finish).collect()
}

fn text_length(longest: usize) -> Option<usize> {
    let len = longest.max(MIN_TEXT_LEN).next_power_of_two();
    if len > MAX_VARCHAR_LEN { None } else { Some(len) }
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// RFC 3339, ISO-8601 without offset, `YYYY-MM-DD HH:MM:SS[.f]`, or a bare date.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
