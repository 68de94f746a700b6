//! Check command - validate day files against the dataset invariants.
//!
//! Read-only. For each day file: it must decode, ids must be unique and
//! non-negative, `date_time` and `ts` must have the 19-character
//! `YYYY-MM-DD HH:MM:SS` shape, and every row's `date_time` must route to
//! the file's own day.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::Args;

use dayfold_core::{Day, is_datetime_shape};
use dayfold_engine::codec;

use crate::{Config, OutputFormat};

/// Arguments for the check command.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Limit the check to specific days (repeatable or comma-separated);
    /// defaults to every day file in the base directory.
    #[arg(long = "day", value_delimiter = ',')]
    pub days: Vec<String>,
}

struct FileReport {
    day: String,
    path: PathBuf,
    rows: usize,
    issues: Vec<String>,
}

/// Execute the check command.
///
/// # Errors
///
/// Returns an error if the base directory cannot be listed or any checked
/// file violates an invariant.
pub fn execute(args: &CheckArgs, config: &Config) -> Result<()> {
    let targets = if args.days.is_empty() {
        scan_day_files(&config.base_dir)?
    } else {
        requested_days(&config.base_dir, &args.days)?
    };

    let reports: Vec<FileReport> = targets
        .into_iter()
        .map(|(day, path)| inspect(&day, path))
        .collect();
    let invalid = reports.iter().filter(|r| !r.issues.is_empty()).count();

    match config.format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = reports
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "day": r.day,
                        "path": r.path,
                        "rows": r.rows,
                        "issues": r.issues,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("failed to serialize report")?
            );
        }
        OutputFormat::Text => {
            for r in &reports {
                if r.issues.is_empty() {
                    println!("ok      {} ({} rows)", r.path.display(), r.rows);
                } else {
                    println!("invalid {}: {}", r.path.display(), r.issues.join("; "));
                }
            }
        }
    }

    if invalid > 0 {
        bail!("{invalid} of {} day files failed validation", reports.len());
    }
    Ok(())
}

/// Lists every `YYYY-MM-DD.parquet` in the base directory, in day order.
fn scan_day_files(base_dir: &Path) -> Result<Vec<(Day, PathBuf)>> {
    let entries = fs::read_dir(base_dir)
        .with_context(|| format!("failed to list {}", base_dir.display()))?;
    let suffix = format!(".{}", codec::DAY_FILE_EXT);

    let mut targets = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", base_dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(&suffix) else {
            continue;
        };
        if let Ok(day) = Day::parse(stem) {
            targets.push((day, entry.path()));
        }
    }
    targets.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(targets)
}

fn requested_days(base_dir: &Path, days: &[String]) -> Result<Vec<(Day, PathBuf)>> {
    let mut targets = Vec::with_capacity(days.len());
    for raw in days {
        let day = Day::parse(raw)?;
        let path = base_dir.join(day.file_name(codec::DAY_FILE_EXT));
        targets.push((day, path));
    }
    targets.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(targets)
}

fn inspect(day: &Day, path: PathBuf) -> FileReport {
    let mut report = FileReport {
        day: day.to_string(),
        path,
        rows: 0,
        issues: Vec::new(),
    };

    let data = match fs::read(&report.path) {
        Ok(data) => data,
        Err(e) => {
            report.issues.push(format!("unreadable: {e}"));
            return report;
        }
    };
    let rows = match codec::read_day_rows(&Bytes::from(data)) {
        Ok(rows) => rows,
        Err(e) => {
            report.issues.push(format!("undecodable: {e}"));
            return report;
        }
    };
    report.rows = rows.len();

    let mut seen = HashSet::with_capacity(rows.len());
    for row in &rows {
        if !seen.insert(row.id) {
            report.issues.push(format!("duplicate id {}", row.id));
        }
        if row.id < 0 {
            report.issues.push(format!("negative id {}", row.id));
        }
        if !is_datetime_shape(&row.date_time) {
            report
                .issues
                .push(format!("id {}: malformed date_time '{}'", row.id, row.date_time));
        } else if &row.date_time[..10] != day.as_str() {
            report
                .issues
                .push(format!("id {}: date_time '{}' outside day", row.id, row.date_time));
        }
        if !is_datetime_shape(&row.ts) {
            report
                .issues
                .push(format!("id {}: malformed ts '{}'", row.id, row.ts));
        }
    }
    report
}
