//! SQL Agent - chat gateway entry point.
//!
//! Serves a chat page and a `POST /ask` endpoint that answers questions with
//! read-only SQL generated by a language model.

use sql_agent::agent::{Agent, AgentOptions};
use sql_agent::config::{Config, load_dotenv};
use sql_agent::db::DbPool;
use sql_agent::error::AgentResult;
use sql_agent::llm::OpenAiClient;
use sql_agent::server;
use sql_agent::snapshot::PoolCatalog;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = load_dotenv() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = Config::parse_args();
    config.log.init_tracing();

    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway stopped");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> AgentResult<()> {
    let database = config.database.parse_database()?;
    let connection = database.connection_config(false)?;
    let api_key = config.require_api_key()?;

    info!(
        database = %connection.masked_connection_string(),
        model = %config.model,
        "Starting SQL Agent v{}",
        env!("CARGO_PKG_VERSION")
    );

    let options = AgentOptions::from_config(&config, &connection);
    info!(
        dialect = %options.dialect,
        schema = options.default_schema.as_deref().unwrap_or("(none)"),
        row_cap = options.row_cap,
        "Resolved query settings"
    );

    let completion = OpenAiClient::new(
        api_key,
        config.model.as_str(),
        &config.completion_url,
        config.completion_timeout_duration(),
    )?;

    let pool = DbPool::connect(&connection).await?;
    let catalog = PoolCatalog::new(
        pool.clone(),
        options.default_schema.clone().unwrap_or_default(),
    );
    let agent = Arc::new(Agent::new(pool, completion, catalog, options));

    server::serve(agent, &config.http_bind_addr()).await?;
    info!("Gateway shutdown complete");
    Ok(())
}
