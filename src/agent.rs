//! The question-to-result pipeline.
//!
//! One call to [`Agent::ask`] runs: snapshot, prompt, completion, sanitize,
//! optional parser check, execute. Nothing is retried; the first failure ends
//! the request.

use crate::config::Config;
use crate::db::{DbPool, QueryExecutor};
use crate::error::{AgentError, AgentResult};
use crate::llm::{CompletionService, PromptBuilder};
use crate::models::{ConnectionConfig, DatabaseType, DEFAULT_ROW_CAP, QueryResult};
use crate::snapshot::{CatalogSource, SchemaSnapshotter};
use crate::sql::{SanitizedQuery, Sanitizer, SqlDialect, validate_single_select};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs of the pipeline that do not depend on the collaborators.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub dialect: SqlDialect,
    pub default_schema: Option<String>,
    pub row_cap: u32,
    pub max_tables: usize,
    pub max_columns: usize,
    pub query_timeout: Duration,
    pub ast_check: bool,
}

impl AgentOptions {
    pub fn from_config(config: &Config, connection: &ConnectionConfig) -> Self {
        Self {
            dialect: config.resolve_dialect(connection.db_type),
            default_schema: config.resolve_schema(connection),
            row_cap: config.row_cap,
            max_tables: config.max_tables,
            max_columns: config.max_columns,
            query_timeout: config.query_timeout_duration(),
            ast_check: !config.no_ast_check,
        }
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            default_schema: None,
            row_cap: DEFAULT_ROW_CAP,
            max_tables: crate::config::DEFAULT_MAX_TABLES,
            max_columns: crate::config::DEFAULT_MAX_COLUMNS,
            query_timeout: Duration::from_secs(crate::models::DEFAULT_QUERY_TIMEOUT_SECS),
            ast_check: true,
        }
    }
}

/// Answers questions against one database.
pub struct Agent<L, C> {
    pool: DbPool,
    completion: L,
    snapshotter: SchemaSnapshotter<C>,
    prompts: PromptBuilder,
    sanitizer: Sanitizer,
    executor: QueryExecutor,
    ast_check: bool,
}

impl<L: CompletionService, C: CatalogSource> Agent<L, C> {
    pub fn new(pool: DbPool, completion: L, catalog: C, options: AgentOptions) -> Self {
        let AgentOptions {
            dialect,
            default_schema,
            row_cap,
            max_tables,
            max_columns,
            query_timeout,
            ast_check,
        } = options;

        let sanitizer = Sanitizer::new(dialect, default_schema, row_cap);
        let prompts = PromptBuilder::new(
            dialect,
            sanitizer.default_schema().map(String::from),
            sanitizer.row_cap(),
        );

        Self {
            pool,
            completion,
            snapshotter: SchemaSnapshotter::new(catalog, max_tables, max_columns),
            prompts,
            sanitizer,
            executor: QueryExecutor::with_limits(query_timeout, row_cap),
            ast_check,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn snapshotter(&self) -> &SchemaSnapshotter<C> {
        &self.snapshotter
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Turn a question into a sanitized statement without executing it.
    pub async fn generate_sql(&self, question: &str) -> AgentResult<SanitizedQuery> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::invalid_input("question must not be empty"));
        }

        let snapshot = self.snapshotter.snapshot().await;
        let prompt = self.prompts.build(question, &snapshot);
        let raw = self.completion.complete(&prompt).await?;
        debug!(raw = %raw, "Model reply");

        let query = self.sanitizer.sanitize(&raw).inspect_err(|e| {
            warn!(error = %e, "Rejected generated SQL");
        })?;

        if self.ast_check {
            validate_single_select(query.as_str(), self.sanitizer.dialect(), Some(self.db_type()))
                .inspect_err(|e| warn!(error = %e, sql = %query, "Parser check failed"))?;
        }

        Ok(query)
    }

    /// Answer a question: generate, sanitize and run one SELECT.
    pub async fn ask(&self, question: &str) -> AgentResult<QueryResult> {
        let query = self.generate_sql(question).await?;
        debug!(sql = %query, "Executing generated SQL");

        let result = self.executor.execute(&self.pool, &query).await?;
        info!(
            rows = result.row_count(),
            truncated = result.truncated,
            elapsed_ms = result.execution_time_ms,
            "Question answered"
        );
        Ok(result)
    }

    fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }
}
