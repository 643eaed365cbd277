//! Connectivity smoke test.
//!
//! Opens one read-only connection, prints the server version and a few table
//! names of the default schema.

use clap::Parser;
use sql_agent::config::{DatabaseArgs, LogArgs, load_dotenv};
use sql_agent::db::{DbPool, SchemaInspector};
use sql_agent::error::AgentResult;
use tracing::error;

/// Number of table names printed.
const TABLE_SAMPLE: i64 = 10;

#[derive(Debug, Parser)]
#[command(
    name = "check-connection",
    about = "Check that the configured database is reachable",
    version
)]
struct Args {
    #[command(flatten)]
    database: DatabaseArgs,

    /// Schema whose tables are listed (default depends on the backend)
    #[arg(long)]
    schema: Option<String>,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() {
    if let Err(e) = load_dotenv() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let args = Args::parse();
    args.log.init_tracing();

    if let Err(e) = run(args).await {
        error!(error = %e, "Connection check failed");
        eprintln!("Connection failed: {}", e);
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AgentResult<()> {
    let mut connection = args.database.parse_database()?.connection_config(false)?;
    connection.pool_options.max_connections = Some(1);
    connection.pool_options.min_connections = Some(1);

    println!("Connecting to {}", connection.masked_connection_string());
    let pool = DbPool::connect(&connection).await?;

    let version = pool.server_version().await;
    println!(
        "{} {}",
        connection.db_type,
        version.as_deref().unwrap_or("(version unknown)")
    );

    let schema = args
        .schema
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| connection.default_schema());

    let tables = match &schema {
        Some(schema) => SchemaInspector::list_tables(&pool, schema, TABLE_SAMPLE).await,
        None => Ok(Vec::new()),
    };
    pool.close().await;

    let tables = tables?;
    match &schema {
        Some(schema) if tables.is_empty() => println!("No tables in schema {}", schema),
        Some(schema) => {
            println!("Tables in {} (first {}):", schema, TABLE_SAMPLE);
            for table in &tables {
                println!("  {}", table);
            }
        }
        None => println!("No schema selected; pass --schema to list tables"),
    }

    println!("Connection OK");
    Ok(())
}
