//! Batch driver: one invocation of the consolidation pipeline.
//!
//! Reading and folding are single-pass and sequential, because the
//! reduction depends on event order. Writing parallelizes at the day
//! boundary - each day owns a distinct file - with bounded concurrency so
//! a batch touching a hundred days does not oversubscribe the host.

use std::fs;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use futures::TryStreamExt;
use futures::stream;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::consolidate::Consolidator;
use crate::error::{EngineError, Result};
use crate::reader::{EventReader, TargetTable};
use crate::writer::{DayOutcome, DayWriter};

/// Configuration for one batch invocation.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory holding the per-day files.
    pub base_dir: PathBuf,
    /// The `<database>.<table>` whose events are consumed.
    pub table: TargetTable,
    /// Optional cap on concurrent day writers; defaults to the number of
    /// CPUs.
    pub max_concurrent_writers: Option<usize>,
}

/// Summary of a completed batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Row events consumed from the input stream.
    pub events: u64,
    /// Days with at least one net effect after consolidation.
    pub days_touched: usize,
    /// Per-day outcomes, in day order.
    pub outcomes: Vec<DayOutcome>,
}

/// Runs one batch: parse, consolidate, and rewrite every touched day.
///
/// Days whose events folded down to no net effect (an INSERT/DELETE pair,
/// for instance) are not written and do not appear in the report.
///
/// # Errors
///
/// Returns the first parse or storage error encountered; on failure no
/// further days are dispatched, and days already rewritten keep their new
/// contents (replay of the same stream converges).
pub async fn run_batch(config: &BatchConfig, input: impl BufRead) -> Result<BatchReport> {
    fs::create_dir_all(&config.base_dir)
        .map_err(|e| EngineError::storage(&config.base_dir, e))?;

    let mut reader = EventReader::new(input, &config.table);
    let mut consolidator = Consolidator::new();
    let mut events: u64 = 0;
    while let Some(event) = reader.next_event()? {
        consolidator.apply(event)?;
        events += 1;
    }

    let jobs: Vec<_> = consolidator
        .into_days()
        .into_iter()
        .filter(|(_, changes)| !changes.is_empty())
        .collect();
    let days_touched = jobs.len();
    tracing::info!(events, days_touched, "input consolidated");

    let writers = writer_limit(days_touched, config.max_concurrent_writers);
    let writer = DayWriter::new(&config.base_dir);
    let outcomes = Arc::new(Mutex::new(Vec::with_capacity(days_touched)));

    stream::iter(jobs.into_iter().map(Ok))
        .try_for_each_concurrent(writers, |(day, changes)| {
            let writer = writer.clone();
            let outcomes = Arc::clone(&outcomes);
            async move {
                let outcome =
                    tokio::task::spawn_blocking(move || writer.apply(&day, changes))
                        .await
                        .map_err(|e| EngineError::InvariantViolation {
                            message: format!("day writer task failed: {e}"),
                        })??;
                outcomes.lock().await.push(outcome);
                Ok(())
            }
        })
        .await?;

    let mut outcomes = Arc::try_unwrap(outcomes)
        .map_err(|_| EngineError::InvariantViolation {
            message: "day outcomes still shared after fan-out".to_string(),
        })?
        .into_inner();
    outcomes.sort_by(|a, b| a.day.cmp(&b.day));

    Ok(BatchReport {
        events,
        days_touched,
        outcomes,
    })
}

/// Bounded pool size: `min(days_touched, N_CPU)`, optionally capped.
fn writer_limit(days_touched: usize, cap: Option<usize>) -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let limit = days_touched.clamp(1, cpus);
    match cap {
        Some(cap) if cap > 0 => limit.min(cap),
        _ => limit,
    }
}
