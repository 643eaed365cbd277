//! Decoding of result rows into JSON.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite is dynamically typed, so its decoder classifies each value by the
//! storage class it actually holds and only uses the declared column type to
//! recognise booleans and JSON.

use crate::models::DatabaseType;
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Text,
    Binary,
    Json,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity stores plain numbers
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Before the integer check: "interval" contains "int"
    if lower.starts_with("timestamp")
        || lower.starts_with("datetime")
        || lower == "date"
        || lower.starts_with("time")
    {
        return TypeCategory::Temporal;
    }
    if lower == "interval" {
        return TypeCategory::Unknown;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "uuid" || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Raw DECIMAL/NUMERIC values as strings, preserving the database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary cells are rendered as base64 text.
pub fn encode_binary(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Conversion of a result row into a JSON record keyed by column name.
pub trait RowToJson {
    fn to_json_map(&self) -> Map<String, JsonValue>;
    fn column_names(&self) -> Vec<String>;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::MySQL);
                (col.name().to_string(), mysql::decode_column(self, idx, category))
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::PostgreSQL);
                (
                    col.name().to_string(),
                    postgres::decode_column(self, idx, type_name, category),
                )
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                (col.name().to_string(), sqlite::decode_column(self, idx, declared))
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        // BIGINT UNSIGNED and narrower unsigned types
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return JsonValue::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return JsonValue::String(v.to_rfc3339());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return JsonValue::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return JsonValue::String(v.to_string());
        }
        decode_text(row, idx)
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> JsonValue {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::String(v);
        }
        // information_schema and some charsets hand back VARBINARY
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|bytes| match String::from_utf8(bytes) {
                Ok(s) => JsonValue::String(s),
                Err(e) => encode_binary(e.as_bytes()),
            })
            .unwrap_or(JsonValue::Null)
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx, type_name),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn decode_temporal(row: &PgRow, idx: usize, type_name: &str) -> JsonValue {
        let value = match type_name.to_uppercase().as_str() {
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)
                .ok()
                .flatten()
                .map(|v| v.to_rfc3339()),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)
                .ok()
                .flatten()
                .map(|v| v.to_string()),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(idx)
                .ok()
                .flatten()
                .map(|v| v.to_string()),
            "TIME" => row
                .try_get::<Option<NaiveTime>, _>(idx)
                .ok()
                .flatten()
                .map(|v| v.to_string()),
            _ => None,
        };
        value.map(JsonValue::String).unwrap_or(JsonValue::Null)
    }

    fn decode_binary(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;
    use sqlx::ValueRef;

    /// `declared` comes from the column's declared type; the storage class of
    /// the value decides how it is read.
    pub fn decode_column(row: &SqliteRow, idx: usize, declared: TypeCategory) -> JsonValue {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return JsonValue::Null,
            Ok(raw) => categorize_type(raw.type_info().name(), DatabaseType::SQLite),
            Err(_) => return JsonValue::Null,
        };

        match (storage, declared) {
            (TypeCategory::Integer, TypeCategory::Boolean) => decode_boolean(row, idx),
            (TypeCategory::Integer, _) => decode_integer(row, idx),
            (TypeCategory::Float, _) => decode_float(row, idx),
            (TypeCategory::Binary, _) => decode_binary(row, idx),
            (_, TypeCategory::Json) => decode_json_text(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(float_value)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_json_text(row: &SqliteRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(Some(v)) => serde_json::from_str(&v).unwrap_or(JsonValue::String(v)),
            _ => JsonValue::Null,
        }
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}
