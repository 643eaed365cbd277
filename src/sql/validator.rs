//! AST check for sanitized statements.
//!
//! The sanitizer works on text. This pass parses the result with
//! [sqlparser](https://docs.rs/sqlparser/) and accepts only a single
//! `Statement::Query`, which closes gaps the text rewrites cannot see
//! (stacked statements, prose left around the query, `EXEC`, `SET`, ...).

use crate::error::{AgentError, AgentResult};
use crate::models::DatabaseType;
use crate::sql::SqlDialect;
use sqlparser::ast::Statement;
use sqlparser::parser::Parser;

mod error_messages {
    pub const NOT_A_QUERY: &str = "Only read-only SELECT statements are allowed.";
    pub const MULTIPLE: &str = "Exactly one SELECT statement is allowed per question.";
    pub const PARSE_ERROR: &str = "Failed to parse SQL statement.";
}

/// Validate that `sql` parses as exactly one read-only query.
///
/// ```
/// use sql_agent::sql::{SqlDialect, validate_single_select};
///
/// assert!(validate_single_select("SELECT TOP 50 * FROM dbo.Orders;", SqlDialect::TSql, None).is_ok());
/// assert!(validate_single_select("SELECT 1; SELECT 2;", SqlDialect::TSql, None).is_err());
/// ```
pub fn validate_single_select(
    sql: &str,
    dialect: SqlDialect,
    db_type: Option<DatabaseType>,
) -> AgentResult<()> {
    let parser_dialect = dialect.parser_dialect(db_type);

    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql).map_err(|e| {
        AgentError::invalid_query(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    match statements.as_slice() {
        [] => Err(AgentError::invalid_query("Empty SQL statement")),
        [Statement::Query(_)] => Ok(()),
        [stmt] => Err(AgentError::disallowed_statement(
            operation_name(stmt),
            error_messages::NOT_A_QUERY,
        )),
        _ => Err(AgentError::disallowed_statement(
            "multiple statements",
            error_messages::MULTIPLE,
        )),
    }
}

/// Name used in error messages for a rejected statement.
fn operation_name(stmt: &Statement) -> String {
    let name = match stmt {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::Merge { .. } => "MERGE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::CreateView { .. } => "CREATE VIEW",
        Statement::CreateIndex { .. } => "CREATE INDEX",
        Statement::AlterTable { .. } => "ALTER TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        Statement::Execute { .. } => "EXECUTE",
        Statement::Call { .. } => "CALL",
        Statement::Grant { .. } => "GRANT",
        Statement::Revoke { .. } => "REVOKE",
        Statement::StartTransaction { .. } => "BEGIN",
        Statement::Commit { .. } => "COMMIT",
        Statement::Rollback { .. } => "ROLLBACK",
        Statement::Explain { .. } => "EXPLAIN",
        _ => {
            // Fall back to the leading keyword of the rendered statement.
            return stmt
                .to_string()
                .split_whitespace()
                .next()
                .map(str::to_uppercase)
                .unwrap_or_else(|| "UNKNOWN".to_string());
        }
    };
    name.to_string()
}
