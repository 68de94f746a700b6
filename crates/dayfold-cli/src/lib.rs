//! # dayfold-cli
//!
//! Command-line interface for the dayfold consolidation pipeline.
//!
//! ## Commands
//!
//! - `dayfold apply` - consume decoded row events and rewrite day files
//! - `dayfold check` - validate existing day files against the dataset
//!   invariants
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `DAYFOLD_BASE_DIR` - directory holding the per-day Parquet files
//! - `DAYFOLD_TABLE` - fully-qualified `<database>.<table>` to consume
//! - `RUST_LOG` - log level filter (e.g. `info`, `dayfold_engine=debug`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dayfold_core::LogFormat;

/// dayfold - consolidate CDC row events into per-day Parquet files.
#[derive(Debug, Parser)]
#[command(name = "dayfold")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the per-day Parquet files.
    #[arg(long, env = "DAYFOLD_BASE_DIR")]
    pub base_dir: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Log output format.
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            base_dir: self.base_dir.clone(),
            format: self.format.clone(),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Consume decoded row events and rewrite the touched day files.
    Apply(commands::apply::ApplyArgs),
    /// Validate existing day files against the dataset invariants.
    Check(commands::check::CheckArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// Log format flag, mapped onto [`dayfold_core::LogFormat`].
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Pretty-printed logs for interactive use.
    #[default]
    Pretty,
    /// JSON logs for cron-driven runs.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// CLI configuration shared by all commands.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the per-day Parquet files.
    pub base_dir: PathBuf,
    /// Output format.
    pub format: OutputFormat,
}
