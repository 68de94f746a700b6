//! # dayfold-engine
//!
//! The CDC consolidation engine behind the `dayfold` tool.
//!
//! One batch invocation takes a stream of decoded row-based binlog events
//! for a single table, reduces it to a minimal per-primary-key effect set,
//! partitions the effects by calendar day, and applies them to per-day
//! Parquet files with a read-modify-write cycle.
//!
//! ## Pipeline
//!
//! ```text
//! stdin text ──> reader ──> consolidate ──> writer (per day, parallel)
//!                 │             │                │
//!            RowEvent     Day -> upserts     <day>.parquet
//!                            + deletes       (atomic replace)
//! ```
//!
//! - [`reader`] parses statement blocks (`INSERT INTO`/`UPDATE`/`DELETE
//!   FROM` plus `@N=` assignments) into [`event::RowEvent`]s.
//! - [`consolidate`] folds events into at most one effect per `(day, pk)`.
//! - [`codec`] owns the day-file Parquet schema and encoding.
//! - [`writer`] applies one day's effects to its file and replaces it
//!   atomically.
//! - [`batch`] drives a whole invocation and fans the touched days out to
//!   writers with bounded concurrency.
//!
//! The durable state is nothing but the per-day files: no index, no
//! manifest, no lock file. Re-running the same batch converges to the same
//! state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod codec;
pub mod consolidate;
pub mod error;
pub mod event;
pub mod reader;
pub mod writer;

// Re-export main types at crate root
pub use batch::{BatchConfig, BatchReport, run_batch};
pub use consolidate::{Consolidator, DayChanges, DayEffects};
pub use error::{EngineError, Result};
pub use event::{RowEvent, RowValue};
pub use reader::{EventReader, TargetTable};
pub use writer::{DayOutcome, DayWriter};
