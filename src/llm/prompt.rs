//! Prompt construction.

use crate::sql::{DENIED_VERBS, SqlDialect};
use serde::Serialize;

/// The two messages sent for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds prompts for a fixed dialect, schema and row cap.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    dialect: SqlDialect,
    default_schema: Option<String>,
    row_cap: u32,
}

impl PromptBuilder {
    pub fn new(dialect: SqlDialect, default_schema: Option<String>, row_cap: u32) -> Self {
        Self {
            dialect,
            default_schema,
            row_cap,
        }
    }

    /// System rules followed by the schema snapshot; the question goes in
    /// the user message.
    pub fn build(&self, question: &str, snapshot: &str) -> Prompt {
        Prompt {
            system: self.system_message(snapshot),
            user: user_message(question),
        }
    }

    fn system_message(&self, snapshot: &str) -> String {
        let schema_rule = match &self.default_schema {
            Some(schema) => format!(
                "- Use the schema {}. Limit: {}.",
                schema,
                self.dialect.row_limit_clause(self.row_cap)
            ),
            None => format!(
                "- Qualify tables as listed below. Limit: {}.",
                self.dialect.row_limit_clause(self.row_cap)
            ),
        };

        format!(
            "You generate {dialect} queries.\n\
             - Answer ONLY with one valid SELECT query (no markdown, no ``` fences, no 'sql:' prefixes).\n\
             - Forbidden: {denied}.\n\
             {schema_rule}\n\
             - {pagination}\n\
             - Arithmetic expressions are allowed in the SELECT list (e.g. col1*col2, (a*b)*rate).\n\
             Schema (sample):\n\
             {snapshot}\n",
            dialect = self.dialect.display_name(),
            denied = DENIED_VERBS.join("/"),
            pagination = self.dialect.pagination_rule(),
        )
    }
}

fn user_message(question: &str) -> String {
    format!(
        "Question: {}\nAnswer ONLY with the SELECT query, without markdown and without prefixes.",
        question.trim()
    )
}
