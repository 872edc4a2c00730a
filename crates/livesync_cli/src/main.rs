//! Livesync CLI
//!
//! Offline developer tools for livesync schemas and recorded server traffic.
//!
//! # Commands
//!
//! - `schema` - List the entities of a schema description
//! - `decode` - Decode one raw row against a table schema
//! - `replay` - Feed recorded server messages through the reconciler

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Livesync command-line developer tools.
#[derive(Parser)]
#[command(name = "livesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entities, arity and columns of a schema description
    Schema {
        /// Schema description JSON (as returned with expand=true)
        schema: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode one raw row against a table schema
    Decode {
        /// Schema description JSON
        schema: PathBuf,

        /// Table whose element schema is used
        #[arg(short, long)]
        table: String,

        /// File holding the raw row (a JSON array)
        row: PathBuf,
    },

    /// Replay recorded server messages through the reconciler
    Replay {
        /// Schema description JSON
        schema: PathBuf,

        /// Server messages, one JSON document per line
        messages: PathBuf,

        /// Primary key of a table, as TABLE=COLUMN (repeatable)
        #[arg(short = 'k', long = "primary-key", value_name = "TABLE=COLUMN")]
        primary_keys: Vec<String>,

        /// Reject updates for tables missing from the schema
        #[arg(long)]
        strict: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Schema { schema, format } => {
            commands::schema::run(&schema, &format)?;
        }
        Commands::Decode { schema, table, row } => {
            commands::decode::run(&schema, &table, &row)?;
        }
        Commands::Replay {
            schema,
            messages,
            primary_keys,
            strict,
            format,
        } => {
            commands::replay::run(&schema, &messages, &primary_keys, strict, &format)?;
        }
        Commands::Version => {
            println!("livesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
