//! # ager
//!
//! Command line front-end for the Ager ready-watermark tracker.
//!
//! ## Commands
//!
//! - `init`: Initialize (or reset) a partition
//! - `record`: Record that a range of keys arrived
//! - `run`: Run the scheduler once and print advanced partitions
//! - `status`: Show a partition ledger or the scheduler state
//! - `serve`: Run the scheduler periodically until interrupted
//!
//! ## Example
//!
//! ```bash
//! # Real-time partition starting at key 1
//! ager init p1 --start 1 --frame-length 0
//! ager record p1 2 10        # prints 1-10
//!
//! # Hourly partition, reported by the scheduler
//! ager --min-frame-length 3600 init p2 --start 1 --frame-length 3600
//! ager --min-frame-length 3600 record p2 2 50
//! ager --min-frame-length 3600 run   # prints {"p2":"1-50"}
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

use commands::{init, record, run, serve, status};

/// Ready-watermark tracker for ordered key streams.
#[derive(Parser, Debug)]
#[command(name = "ager")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the default config and database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/ager.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Minimum frame length in seconds, overriding the configuration
    #[arg(long, global = true)]
    min_frame_length: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize (or reset) a partition
    Init {
        /// Partition key
        key: String,

        /// First key of the partition
        #[arg(long, allow_negative_numbers = true)]
        start: i64,

        /// Seconds per frame (0 or 1 for real time)
        #[arg(long, default_value = "0")]
        frame_length: u32,
    },

    /// Record that keys start..=end arrived
    #[command(allow_negative_numbers = true)]
    Record {
        /// Partition key
        key: String,

        /// First key of the range
        start: i64,

        /// Last key of the range
        end: i64,
    },

    /// Run the scheduler once
    Run {
        /// First frame to scan (YYYYMMDDHHMMSS)
        #[arg(long)]
        start: Option<String>,

        /// Last frame to scan (YYYYMMDDHHMMSS)
        #[arg(long)]
        end: Option<String>,
    },

    /// Show a partition ledger, or the scheduler state without a key
    Status {
        /// Partition key
        key: Option<String>,
    },

    /// Run the scheduler periodically until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config = settings::load(
        &data_dir,
        cli.config.as_deref(),
        cli.database,
        cli.min_frame_length,
    )?;

    match cli.command {
        Commands::Init {
            key,
            start,
            frame_length,
        } => {
            let ager = settings::open(&config).await?;
            init::run(&ager, &key, start, frame_length).await?;
        }
        Commands::Record { key, start, end } => {
            let ager = settings::open(&config).await?;
            record::run(&ager, &key, start, end).await?;
        }
        Commands::Run { start, end } => {
            let ager = settings::open(&config).await?;
            run::run(&ager, start.as_deref(), end.as_deref()).await?;
        }
        Commands::Status { key } => {
            let ager = settings::open(&config).await?;
            status::run(&ager, key.as_deref()).await?;
        }
        Commands::Serve => {
            serve::run(config).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for ager.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("dev", "ager", "ager")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
