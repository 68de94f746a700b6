//! Row events and stored row values.
//!
//! A [`RowEvent`] is one parsed INSERT/UPDATE/DELETE against the target
//! table; it lives only for the duration of a batch. A [`RowValue`] is the
//! durable form a row takes inside a day file.

use serde::{Deserialize, Serialize};

/// One decoded row event from the binlog text stream.
///
/// The reader fills only the fields relevant to the kind: deletes identify
/// the row and its day, nothing more.
#[derive(Debug, Clone, PartialEq)]
pub enum RowEvent {
    /// A row was inserted.
    Insert {
        /// Primary key (`@1`).
        pk: i64,
        /// Wall-clock datetime string (`@3`), `YYYY-MM-DD HH:MM:SS`.
        dt: String,
        /// Measured value (`@4`), or None for SQL NULL.
        value: Option<f64>,
        /// Modification time (`@6`), Unix epoch seconds.
        ts: u64,
    },
    /// A row was updated (after-image).
    Update {
        /// Primary key (`@1`).
        pk: i64,
        /// Wall-clock datetime string (`@3`), `YYYY-MM-DD HH:MM:SS`.
        dt: String,
        /// Measured value (`@4`), or None for SQL NULL.
        value: Option<f64>,
        /// Modification time (`@6`), Unix epoch seconds.
        ts: u64,
    },
    /// A row was deleted.
    Delete {
        /// Primary key (`@1`).
        pk: i64,
        /// Wall-clock datetime string (`@3`) of the deleted row.
        dt: String,
    },
}

impl RowEvent {
    /// Returns the event's primary key.
    #[must_use]
    pub fn pk(&self) -> i64 {
        match self {
            Self::Insert { pk, .. } | Self::Update { pk, .. } | Self::Delete { pk, .. } => *pk,
        }
    }

    /// Returns the event's datetime string, which routes it to a day.
    #[must_use]
    pub fn dt(&self) -> &str {
        match self {
            Self::Insert { dt, .. } | Self::Update { dt, .. } | Self::Delete { dt, .. } => dt,
        }
    }
}

/// One row as stored in a day file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowValue {
    /// Primary key.
    pub id: i64,
    /// Wall-clock datetime, verbatim from the event (`YYYY-MM-DD HH:MM:SS`).
    pub date_time: String,
    /// Measured value; None round-trips as a Parquet null.
    pub value: Option<f64>,
    /// Modification time as the fixed-offset string encoding
    /// (see [`dayfold_core::timefmt`]).
    pub ts: String,
}
