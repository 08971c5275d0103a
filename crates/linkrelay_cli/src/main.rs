//! LinkRelay CLI
//!
//! Runs the change-log relay and offers offline tools around it.
//!
//! # Commands
//!
//! - `run` - Consume the change topic and mirror it into a record store
//! - `decode` - Decode a single change envelope and show the result
//! - `replay` - Apply a file of envelopes to a journal store
//! - `inspect` - List the records held in a journal store

mod commands;

use clap::{Parser, Subcommand};
use commands::{OutputFormat, RunArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LinkRelay change-log relay.
#[derive(Parser)]
#[command(name = "linkrelay")]
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
    /// Consume the change topic and mirror it into a record store
    Run(RunArgs),

    /// Decode a single change envelope and show the result
    Decode {
        /// File holding one envelope
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Apply a JSON-lines file of envelopes to a journal store
    Replay {
        /// File with one envelope per line
        file: PathBuf,

        /// Journal to apply the envelopes to
        #[arg(short, long, env = "RELAY_JOURNAL", default_value = "linkrelay.journal")]
        journal: PathBuf,

        /// Compact the journal afterwards
        #[arg(long)]
        compact: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the records held in a journal store
    Inspect {
        /// Journal to read
        #[arg(short, long, env = "RELAY_JOURNAL", default_value = "linkrelay.journal")]
        journal: PathBuf,

        /// Show only the record with this short code
        #[arg(short, long)]
        short_code: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // settings may come from a local .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run(args) => commands::run::run(&args)?,
        Commands::Decode { file, format } => commands::decode::run(&file, format)?,
        Commands::Replay {
            file,
            journal,
            compact,
            format,
        } => commands::replay::run(&file, &journal, compact, format)?,
        Commands::Inspect {
            journal,
            short_code,
            format,
        } => commands::inspect::run(&journal, short_code.as_deref(), format)?,
    }

    Ok(())
}
