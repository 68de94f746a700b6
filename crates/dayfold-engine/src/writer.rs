//! Per-day read-modify-write against the columnar dataset.
//!
//! Each touched day is loaded into memory, the batch's effects are applied
//! in a fixed order (deletes, then updates, then inserts), and the file is
//! rewritten through a sibling temp path: write, fsync, rename. A reader
//! elsewhere in the pipeline therefore sees either the pre-batch or the
//! post-batch file, never a torn intermediate, and a failed run leaves the
//! old file in place.
//!
//! Days are independent files, so distinct days may be written in
//! parallel; a single day is exclusive to one writer.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File};
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;

use dayfold_core::Day;

use crate::codec;
use crate::consolidate::DayChanges;
use crate::error::{EngineError, Result};
use crate::event::RowValue;

/// Result of applying one day's change set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOutcome {
    /// The day key (`YYYY-MM-DD`).
    pub day: String,
    /// Path of the day file.
    pub path: PathBuf,
    /// Rows in the file after the batch; 0 when the file was removed.
    pub rows: u64,
    /// True if the batch emptied the day and its file was deleted.
    pub file_removed: bool,
    /// Deletes that removed an existing row.
    pub deletes_applied: u64,
    /// Updates that replaced an existing row.
    pub updates_applied: u64,
    /// Updates skipped because the key was not in the day's partition.
    pub updates_skipped: u64,
    /// Rows upserted from inserts.
    pub inserts_applied: u64,
}

/// Applies consolidated change sets to per-day Parquet files.
#[derive(Debug, Clone)]
pub struct DayWriter {
    base_dir: PathBuf,
}

impl DayWriter {
    /// Creates a writer rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the path of a day's file.
    #[must_use]
    pub fn day_path(&self, day: &Day) -> PathBuf {
        self.base_dir.join(day.file_name(codec::DAY_FILE_EXT))
    }

    /// Sibling temp path used for the atomic replace. Deterministic, so a
    /// leftover from a killed run is swept on the next one.
    fn temp_path(&self, day: &Day) -> PathBuf {
        self.base_dir
            .join(format!(".{}.{}.tmp", day, codec::DAY_FILE_EXT))
    }

    /// Applies one day's effects with a read-modify-write cycle.
    ///
    /// # Errors
    ///
    /// Returns a storage or Parquet error if the existing file cannot be
    /// read, or if encoding, writing, or renaming the replacement fails.
    /// The pre-batch file survives any failure.
    pub fn apply(&self, day: &Day, changes: DayChanges) -> Result<DayOutcome> {
        let path = self.day_path(day);
        let mut outcome = DayOutcome {
            day: day.to_string(),
            path: path.clone(),
            rows: 0,
            file_removed: false,
            deletes_applied: 0,
            updates_applied: 0,
            updates_skipped: 0,
            inserts_applied: 0,
        };
        if changes.is_empty() {
            return Ok(outcome);
        }

        let mut table = self.load(&path)?;
        let effects = changes.into_effects();

        for pk in &effects.deletes {
            if table.remove(pk).is_some() {
                outcome.deletes_applied += 1;
            }
        }
        for row in effects.updates {
            match table.entry(row.id) {
                Entry::Occupied(mut entry) => {
                    entry.insert(row);
                    outcome.updates_applied += 1;
                }
                // The row was never in this day's partition.
                Entry::Vacant(_) => outcome.updates_skipped += 1,
            }
        }
        for row in effects.inserts {
            table.insert(row.id, row);
            outcome.inserts_applied += 1;
        }

        if table.is_empty() {
            outcome.file_removed = self.remove(&path)?;
            if outcome.file_removed {
                tracing::info!(path = %path.display(), "day file removed, no rows remain");
            }
            return Ok(outcome);
        }

        let mut rows: Vec<RowValue> = table.into_values().collect();
        rows.sort_unstable_by_key(|r| r.id);
        outcome.rows = rows.len() as u64;

        let bytes = codec::write_day_rows(&rows)?;
        self.replace(day, &path, &bytes)?;
        tracing::info!(
            path = %path.display(),
            rows = outcome.rows,
            deletes = outcome.deletes_applied,
            updates = outcome.updates_applied,
            inserts = outcome.inserts_applied,
            "day file rewritten"
        );
        Ok(outcome)
    }

    /// Loads an existing day file; a missing file is an empty table.
    fn load(&self, path: &Path) -> Result<HashMap<i64, RowValue>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(EngineError::storage(path, e)),
        };
        let rows = codec::read_day_rows(&Bytes::from(data)).map_err(|e| match e {
            EngineError::Parquet { message } => EngineError::Parquet {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })?;
        let mut table = HashMap::with_capacity(rows.len());
        for row in rows {
            table.insert(row.id, row);
        }
        Ok(table)
    }

    /// Removes a day file; returns false if it was already gone.
    fn remove(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EngineError::storage(path, e)),
        }
    }

    /// Write-temp-then-rename. The target is replaced only after the temp
    /// file is fully written and fsynced.
    fn replace(&self, day: &Day, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = self.temp_path(day);
        // Sweep a partial temp file left by a killed prior run.
        let _ = fs::remove_file(&tmp);

        let result = (|| -> Result<()> {
            let mut file = File::create(&tmp).map_err(|e| EngineError::storage(&tmp, e))?;
            file.write_all(bytes)
                .map_err(|e| EngineError::storage(&tmp, e))?;
            file.sync_all().map_err(|e| EngineError::storage(&tmp, e))?;
            drop(file);
            fs::rename(&tmp, path).map_err(|e| EngineError::storage(path, e))
        })();

        if result.is_err() {
            // Best effort; the stale-temp sweep covers leftovers anyway.
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::Consolidator;
    use crate::event::RowEvent;

    fn changes_for(day: &str, events: Vec<RowEvent>) -> (Day, DayChanges) {
        let mut consolidator = Consolidator::new();
        for event in events {
            consolidator.apply(event).expect("apply");
        }
        let mut days = consolidator.into_days();
        let day = Day::parse(day).expect("day");
        let changes = days.remove(&day).expect("day touched");
        (day, changes)
    }

    fn insert(pk: i64, dt: &str, value: Option<f64>) -> RowEvent {
        RowEvent::Insert {
            pk,
            dt: dt.to_string(),
            value,
            ts: 1,
        }
    }

    fn update(pk: i64, dt: &str, value: Option<f64>) -> RowEvent {
        RowEvent::Update {
            pk,
            dt: dt.to_string(),
            value,
            ts: 2,
        }
    }

    fn delete(pk: i64, dt: &str) -> RowEvent {
        RowEvent::Delete {
            pk,
            dt: dt.to_string(),
        }
    }

    fn read_rows(path: &Path) -> Vec<RowValue> {
        let data = fs::read(path).expect("read file");
        codec::read_day_rows(&Bytes::from(data)).expect("decode")
    }

    #[test]
    fn creates_file_with_rows_sorted_by_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());
        let (day, changes) = changes_for(
            "2025-01-02",
            vec![
                insert(9, "2025-01-02 03:00:00", Some(9.0)),
                insert(1, "2025-01-02 04:00:00", Some(1.0)),
                insert(5, "2025-01-02 05:00:00", None),
            ],
        );

        let outcome = writer.apply(&day, changes).expect("apply");
        assert_eq!(outcome.rows, 3);
        assert_eq!(outcome.inserts_applied, 3);

        let rows = read_rows(&outcome.path);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 5, 9]);
    }

    #[test]
    fn update_against_missing_pk_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());
        let (day, changes) = changes_for(
            "2025-01-04",
            vec![update(99, "2025-01-04 12:00:00", Some(5.0))],
        );

        let outcome = writer.apply(&day, changes).expect("apply");
        assert_eq!(outcome.updates_skipped, 1);
        assert_eq!(outcome.updates_applied, 0);
        assert!(!outcome.path.exists(), "no file should be created");
    }

    #[test]
    fn delete_of_last_row_removes_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());

        let (day, seed) = changes_for("2025-01-03", vec![insert(7, "2025-01-03 10:00:00", Some(1.0))]);
        let outcome = writer.apply(&day, seed).expect("seed");
        assert!(outcome.path.exists());

        let (day, changes) = changes_for(
            "2025-01-03",
            vec![
                update(7, "2025-01-03 10:30:00", Some(2.0)),
                delete(7, "2025-01-03 11:00:00"),
            ],
        );
        let outcome = writer.apply(&day, changes).expect("apply");
        assert!(outcome.file_removed);
        assert_eq!(outcome.rows, 0);
        assert!(!outcome.path.exists());
    }

    #[test]
    fn insert_upserts_over_existing_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());

        let (day, seed) = changes_for("2025-01-05", vec![insert(2, "2025-01-05 00:00:00", Some(1.0))]);
        writer.apply(&day, seed).expect("seed");

        let (day, changes) = changes_for("2025-01-05", vec![insert(2, "2025-01-05 06:00:00", Some(8.0))]);
        let outcome = writer.apply(&day, changes).expect("apply");
        assert_eq!(outcome.rows, 1);

        let rows = read_rows(&outcome.path);
        assert_eq!(rows[0].value, Some(8.0));
        assert_eq!(rows[0].date_time, "2025-01-05 06:00:00");
    }

    #[test]
    fn update_replaces_row_loaded_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());

        let (day, seed) = changes_for("2025-01-06", vec![insert(3, "2025-01-06 00:00:00", Some(1.0))]);
        writer.apply(&day, seed).expect("seed");

        let (day, changes) = changes_for("2025-01-06", vec![update(3, "2025-01-06 00:30:00", None)]);
        let outcome = writer.apply(&day, changes).expect("apply");
        assert_eq!(outcome.updates_applied, 1);

        let rows = read_rows(&outcome.path);
        assert_eq!(rows[0].value, None);
    }

    #[test]
    fn stale_temp_file_is_swept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());
        let day = Day::parse("2025-01-07").expect("day");

        let tmp = writer.temp_path(&day);
        fs::write(&tmp, b"torn partial write").expect("plant stale temp");

        let (day, changes) = changes_for("2025-01-07", vec![insert(1, "2025-01-07 00:00:00", Some(1.0))]);
        let outcome = writer.apply(&day, changes).expect("apply");
        assert!(!tmp.exists(), "stale temp should be gone");
        assert_eq!(read_rows(&outcome.path).len(), 1);
    }

    #[test]
    fn empty_change_set_touches_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());
        let day = Day::parse("2025-01-08").expect("day");

        let outcome = writer.apply(&day, DayChanges::default()).expect("apply");
        assert_eq!(outcome.rows, 0);
        assert!(!outcome.file_removed);
        assert!(!outcome.path.exists());
    }

    #[test]
    fn unreadable_existing_file_fails_with_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = DayWriter::new(dir.path());
        let day = Day::parse("2025-01-09").expect("day");
        fs::write(writer.day_path(&day), b"corrupt").expect("plant corrupt file");

        let (_, changes) = changes_for("2025-01-09", vec![insert(1, "2025-01-09 00:00:00", None)]);
        let err = writer.apply(&day, changes).expect_err("must fail");
        assert!(err.to_string().contains("2025-01-09"), "{err}");
    }
}
