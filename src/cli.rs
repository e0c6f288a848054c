//! Command-line interface

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Sharp-money signal detection over betting split data
#[derive(Parser, Debug)]
#[command(name = "sharpline")]
#[command(author, version, about = "Detect, score and resolve sharp-money signals")]
pub struct Cli {
    /// Directory holding default.toml and environment overrides
    #[arg(short, long, global = true, default_value = "config", env = "SHARPLINE_CONFIG_DIR")]
    pub config: PathBuf,

    /// Emit JSON logs on the console
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one detection pass against the database
    Detect {
        /// Look-back window ending now
        #[arg(long, default_value = "24")]
        hours: i64,
        /// Override the configured deadline (milliseconds)
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Print only the run manifest
        #[arg(long)]
        manifest_only: bool,
    },

    /// Run one detection pass over a JSON file of split records
    Replay {
        /// JSON array of records
        #[arg(short, long)]
        file: PathBuf,
        /// Window start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Window end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
        /// Print only the run manifest
        #[arg(long)]
        manifest_only: bool,
    },

    /// Validate configuration and exit
    CheckConfig,
}
