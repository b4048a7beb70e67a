//! csvdb CLI
//!
//! Command-line access to one fixed-width table. Results are printed as
//! one JSON document per line on stdout; logs go to stderr.

use clap::{Args as ClapArgs, Parser, Subcommand};
use csvdb::{ColumnType, CsvDbError, ReadOutcome, Table, TableConfig, Value, Values};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

/// csvdb CLI
#[derive(Parser, Debug)]
#[command(name = "csvdb-cli")]
#[command(about = "Fixed-width record storage over plain text files")]
#[command(version)]
struct Args {
    #[command(flatten)]
    table: TableArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Schema flags shared by every subcommand
#[derive(ClapArgs, Debug)]
struct TableArgs {
    /// Data directory
    #[arg(short, long, default_value = "./csvdb_data", global = true)]
    data_dir: String,

    /// Table file name
    #[arg(short, long, default_value = "table.csv", global = true)]
    table: String,

    /// Content bytes per record
    #[arg(short, long, default_value = "256", global = true)]
    width: usize,

    /// Column as name:type (repeatable, in order)
    #[arg(short, long = "column", value_parser = parse_column, global = true)]
    columns: Vec<(String, ColumnType)>,

    /// Stamp created_at/updated_at on writes
    #[arg(long, global = true)]
    timestamps: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the table file and its directories
    Init,

    /// Append a record from a JSON array or object
    Insert {
        /// The values to insert
        values: String,
    },

    /// Read one record
    Get {
        /// The record number
        r_id: u64,
    },

    /// Overwrite a live record
    Update {
        /// The record number
        r_id: u64,

        /// The new values (JSON array or object)
        values: String,

        /// Only change the named columns
        #[arg(long)]
        partial: bool,
    },

    /// Delete a record
    Delete {
        /// The record number
        r_id: u64,

        /// Blank the record instead of flagging it
        #[arg(long)]
        hard: bool,
    },

    /// List live records
    List {
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u64,

        /// Records per page window
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Print the number of slots in the table
    Count,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,csvdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> csvdb::Result<()> {
    let config = TableConfig::builder()
        .data_dir(&args.table.data_dir)
        .table_name(&args.table.table)
        .max_record_width(args.table.width)
        .columns(args.table.columns)
        .auto_timestamps(args.table.timestamps)
        .build()?;

    let table = Table::open(config)?;
    let records = table.records();

    match args.command {
        Commands::Init => {
            println!("{}", json!({ "table": table.config().table_name(), "rows": records.len()? }));
        }
        Commands::Insert { values } => {
            let r_id = records.create(parse_values(&values)?)?;
            println!("{}", json!({ "r_id": r_id }));
        }
        Commands::Get { r_id } => {
            let output = match records.read(r_id)? {
                ReadOutcome::Live(record) => record.to_json(),
                ReadOutcome::SoftDeleted => json!({ "r_id": r_id, "deleted": "soft" }),
                ReadOutcome::HardDeleted => json!({ "r_id": r_id, "deleted": "hard" }),
                ReadOutcome::NotFound => json!({ "r_id": r_id, "found": false }),
            };
            println!("{}", output);
        }
        Commands::Update { r_id, values, partial } => {
            records.update(r_id, parse_values(&values)?, partial)?;
            println!("{}", json!({ "r_id": r_id, "updated": true }));
        }
        Commands::Delete { r_id, hard } => {
            records.delete(r_id, hard)?;
            let kind = if hard { "hard" } else { "soft" };
            println!("{}", json!({ "r_id": r_id, "deleted": kind }));
        }
        Commands::List { page, limit } => {
            for record in records.list(page, limit)? {
                println!("{}", record.to_json());
            }
        }
        Commands::Count => {
            println!("{}", json!({ "rows": records.len()? }));
        }
    }

    Ok(())
}

/// "name:type" → (name, type)
fn parse_column(s: &str) -> Result<(String, ColumnType), String> {
    let (name, ty) = s
        .split_once(':')
        .ok_or_else(|| format!("expected name:type, got '{}'", s))?;
    let ty = ty.parse::<ColumnType>().map_err(|e| e.to_string())?;
    Ok((name.to_string(), ty))
}

/// A JSON array becomes positional values, an object named values
fn parse_values(input: &str) -> csvdb::Result<Values> {
    match serde_json::from_str::<serde_json::Value>(input)? {
        serde_json::Value::Array(items) => {
            Ok(Values::Positional(items.into_iter().map(Value::from).collect()))
        }
        serde_json::Value::Object(fields) => Ok(Values::Named(
            fields
                .into_iter()
                .map(|(name, value)| (name, Value::from(value)))
                .collect(),
        )),
        other => Err(CsvDbError::InvalidInput(format!(
            "expected a JSON array or object, got {}",
            other
        ))),
    }
}
