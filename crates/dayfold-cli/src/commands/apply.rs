//! Apply command - consume decoded row events and rewrite day files.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use dayfold_engine::{BatchConfig, BatchReport, TargetTable, run_batch};

use crate::{Config, OutputFormat};

/// Arguments for the apply command.
#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Fully-qualified table to consume (`<database>.<table>`).
    #[arg(long, env = "DAYFOLD_TABLE")]
    pub table: String,

    /// Read events from a file instead of standard input.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Cap on concurrent day writers (defaults to the number of CPUs).
    #[arg(long)]
    pub max_writers: Option<usize>,
}

/// Execute the apply command.
///
/// # Errors
///
/// Returns an error on malformed input, an unreadable or unwritable day
/// file, or an invalid table identifier.
pub async fn execute(args: ApplyArgs, config: &Config) -> Result<()> {
    let table = TargetTable::parse(&args.table)?;
    let batch_config = BatchConfig {
        base_dir: config.base_dir.clone(),
        table,
        max_concurrent_writers: args.max_writers,
    };

    let started = Instant::now();
    let report = match args.input {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open input {}", path.display()))?;
            run_batch(&batch_config, BufReader::new(file)).await?
        }
        None => run_batch(&batch_config, io::stdin().lock()).await?,
    };
    let elapsed = started.elapsed().as_secs_f64();

    match config.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "report": report,
                    "elapsedSeconds": elapsed,
                }))
                .context("failed to serialize report")?
            );
        }
        OutputFormat::Text => print_text(&report, elapsed),
    }
    Ok(())
}

fn print_text(report: &BatchReport, elapsed: f64) {
    for outcome in &report.outcomes {
        if outcome.file_removed {
            println!("removed {}", outcome.path.display());
        } else if outcome.rows > 0 {
            println!("updated {} ({} rows)", outcome.path.display(), outcome.rows);
        }
    }
    println!(
        "{} events consolidated across {} days in {elapsed:.2}s",
        report.events, report.days_touched
    );
}
