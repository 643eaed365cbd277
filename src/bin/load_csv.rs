//! Bulk-load a CSV file into a table.
//!
//! Column types are inferred from the data. The table is created when
//! missing; `--if-exists` decides what happens when it is not.

use clap::Parser;
use sql_agent::config::{DatabaseArgs, LogArgs, load_dotenv};
use sql_agent::db::DbPool;
use sql_agent::error::{AgentError, AgentResult};
use sql_agent::loader::{self, CsvTable, DEFAULT_CHUNK_SIZE, IfExists, LoadOptions};
use std::path::PathBuf;
use tracing::error;

#[derive(Debug, Parser)]
#[command(
    name = "load-csv",
    about = "Load a CSV file into a database table, inferring column types",
    version
)]
struct Args {
    #[command(flatten)]
    database: DatabaseArgs,

    /// Path of the CSV file
    #[arg(long)]
    csv: PathBuf,

    /// Target table name (without schema)
    #[arg(long)]
    table: String,

    /// Target schema (default depends on the backend)
    #[arg(long)]
    schema: Option<String>,

    /// Behavior when the table already exists
    #[arg(long, value_enum, default_value_t = IfExists::Append)]
    if_exists: IfExists,

    /// Field separator
    #[arg(long, default_value_t = ',')]
    sep: char,

    /// Rows per INSERT statement
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunksize: usize,

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
        error!(error = %e, "Load failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AgentResult<()> {
    let delimiter = u8::try_from(args.sep)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| AgentError::invalid_input("--sep must be a single ASCII character"))?;

    let table = args.table.trim();
    if table.is_empty() {
        return Err(AgentError::invalid_input("--table must not be empty"));
    }

    let connection = args.database.parse_database()?.connection_config(true)?;
    let schema = args
        .schema
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| connection.default_schema())
        .ok_or_else(|| {
            AgentError::configuration("no schema given and the database URL names none; pass --schema")
        })?;

    println!("Reading CSV: {}", args.csv.display());
    let csv = CsvTable::read(&args.csv, delimiter)?;

    let pool = DbPool::connect(&connection).await?;
    println!(
        "Inserting into {}.{} ({} rows)...",
        schema,
        table,
        csv.records.len()
    );

    let options = LoadOptions {
        table: table.to_string(),
        schema,
        if_exists: args.if_exists,
        chunk_size: args.chunksize,
    };
    let result = loader::load(&pool, &csv, &options).await;
    pool.close().await;

    let report = result?;
    println!("OK! Rows in table {}: {}", report.table, report.total_rows);
    Ok(())
}
