//! Steady CLI
//!
//! Command-line tools for the steady configuration controller.
//!
//! # Commands
//!
//! - `run` - Run the controller against an in-memory store
//! - `validate` - Check a controller config file
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Steady configuration controller tools.
#[derive(Parser)]
#[command(name = "steady")]
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
    /// Run the controller against an in-memory store and print a summary
    Run {
        /// Controller config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Name of the configuration object to reconcile
        #[arg(short, long)]
        target: Option<String>,

        /// Number of worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// How long to run
        #[arg(long, default_value = "2")]
        duration_secs: u64,

        /// Change the stored policy at this interval
        #[arg(long)]
        drift_every_ms: Option<u64>,

        /// Delete the stored policy once, after this delay
        #[arg(long)]
        delete_after_ms: Option<u64>,
    },

    /// Parse and validate a controller config file
    Validate {
        /// Controller config file (JSON)
        #[arg(short, long)]
        config: PathBuf,
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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            config,
            target,
            workers,
            duration_secs,
            drift_every_ms,
            delete_after_ms,
        } => {
            let options = commands::run::RunOptions {
                config,
                target,
                workers,
                duration: Duration::from_secs(duration_secs),
                drift_every: drift_every_ms.map(Duration::from_millis),
                delete_after: delete_after_ms.map(Duration::from_millis),
            };
            commands::run::run(&options)?;
        }
        Commands::Validate { config } => {
            commands::validate::run(&config)?;
        }
        Commands::Version => {
            println!("Steady CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Steady Core v{}", steady_core::VERSION);
        }
    }

    Ok(())
}
