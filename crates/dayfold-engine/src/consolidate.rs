//! Per-day, per-primary-key event reduction.
//!
//! A batch may carry many events for one row; only the net effect matters.
//! The consolidator folds the stream into at most one effect per
//! `(day, pk)`: an upsert carrying the latest row image, or a delete.
//!
//! Upserts remember whether they originate from an INSERT or an UPDATE,
//! because the distinction changes both the collapse and the apply:
//!
//! - an INSERT-origin row deleted later in the same batch never existed on
//!   disk, so the pair folds to nothing;
//! - an UPDATE-origin row deleted later may exist on disk from an earlier
//!   batch, so the delete must still be applied;
//! - at apply time, INSERT-origin rows upsert unconditionally while
//!   UPDATE-origin rows only replace keys already present in the file.
//!
//! Routing uses the day cut from each event's own `dt`, so one pk can
//! produce effects in several days within a batch (a row moved across
//! midnight). Days are tracked independently; no cross-day deduplication
//! is performed.

use std::collections::{BTreeMap, HashMap, HashSet};

use dayfold_core::{Day, format_stored_ts};

use crate::error::{EngineError, Result};
use crate::event::{RowEvent, RowValue};

/// Which statement kind produced an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertOrigin {
    Insert,
    Update,
}

#[derive(Debug, Clone)]
struct TaggedRow {
    origin: UpsertOrigin,
    row: RowValue,
}

/// The net effects collected for one day.
#[derive(Debug, Default)]
pub struct DayChanges {
    upserts: HashMap<i64, TaggedRow>,
    deletes: HashSet<i64>,
}

impl DayChanges {
    /// True if the day folded down to no effect at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Number of upserts (inserts plus updates) recorded for the day.
    #[must_use]
    pub fn upsert_count(&self) -> usize {
        self.upserts.len()
    }

    /// Number of deletes recorded for the day.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.len()
    }

    /// Splits the change set into the three effect groups the writer
    /// applies, in apply order: deletes, updates, inserts.
    #[must_use]
    pub fn into_effects(self) -> DayEffects {
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        for tagged in self.upserts.into_values() {
            match tagged.origin {
                UpsertOrigin::Insert => inserts.push(tagged.row),
                UpsertOrigin::Update => updates.push(tagged.row),
            }
        }
        let mut deletes: Vec<i64> = self.deletes.into_iter().collect();
        deletes.sort_unstable();
        DayEffects {
            deletes,
            updates,
            inserts,
        }
    }

    fn record_insert(&mut self, pk: i64, row: RowValue) {
        self.deletes.remove(&pk);
        self.upserts.insert(
            pk,
            TaggedRow {
                origin: UpsertOrigin::Insert,
                row,
            },
        );
    }

    fn record_update(&mut self, pk: i64, row: RowValue) {
        // A delete followed by an update within one batch is not defined by
        // upstream ordering guarantees; the later write wins and keeps the
        // update's only-if-preexisting apply semantics.
        self.deletes.remove(&pk);
        let origin = match self.upserts.get(&pk) {
            Some(TaggedRow {
                origin: UpsertOrigin::Insert,
                ..
            }) => UpsertOrigin::Insert,
            _ => UpsertOrigin::Update,
        };
        self.upserts.insert(pk, TaggedRow { origin, row });
    }

    fn record_delete(&mut self, pk: i64) {
        match self.upserts.remove(&pk) {
            // The row was born in this batch; it never reached disk.
            Some(TaggedRow {
                origin: UpsertOrigin::Insert,
                ..
            }) => {}
            // Updated rows may exist on disk from a previous batch.
            Some(TaggedRow {
                origin: UpsertOrigin::Update,
                ..
            })
            | None => {
                self.deletes.insert(pk);
            }
        }
    }
}

/// The three effect groups for one day, in apply order.
#[derive(Debug)]
pub struct DayEffects {
    /// Primary keys to remove, sorted.
    pub deletes: Vec<i64>,
    /// Rows that replace existing keys only.
    pub updates: Vec<RowValue>,
    /// Rows that upsert unconditionally.
    pub inserts: Vec<RowValue>,
}

/// Folds a stream of row events into per-day change sets.
#[derive(Debug, Default)]
pub struct Consolidator {
    days: BTreeMap<Day, DayChanges>,
}

impl Consolidator {
    /// Creates an empty consolidator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event to the fold.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidEvent` if the event's timestamp cannot
    /// be encoded into the stored form.
    pub fn apply(&mut self, event: RowEvent) -> Result<()> {
        let day = Day::from_datetime(event.dt()).map_err(|e| EngineError::InvalidEvent {
            pk: event.pk(),
            message: e.to_string(),
        })?;
        let changes = self.days.entry(day).or_default();

        match event {
            RowEvent::Insert { pk, dt, value, ts } => {
                changes.record_insert(pk, materialize(pk, dt, value, ts)?);
            }
            RowEvent::Update { pk, dt, value, ts } => {
                changes.record_update(pk, materialize(pk, dt, value, ts)?);
            }
            RowEvent::Delete { pk, .. } => changes.record_delete(pk),
        }
        Ok(())
    }

    /// Number of days with at least one recorded event.
    #[must_use]
    pub fn days_touched(&self) -> usize {
        self.days.len()
    }

    /// Consumes the fold, yielding change sets in day order.
    #[must_use]
    pub fn into_days(self) -> BTreeMap<Day, DayChanges> {
        self.days
    }
}

/// Builds the stored row for an upsert event.
fn materialize(pk: i64, dt: String, value: Option<f64>, ts: u64) -> Result<RowValue> {
    let ts = format_stored_ts(ts).map_err(|e| EngineError::InvalidEvent {
        pk,
        message: e.to_string(),
    })?;
    Ok(RowValue {
        id: pk,
        date_time: dt,
        value,
        ts,
    })
}
