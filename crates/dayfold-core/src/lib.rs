//! # dayfold-core
//!
//! Shared primitives for the dayfold CDC consolidation pipeline.
//!
//! This crate provides the foundational types used across all dayfold
//! components:
//!
//! - **Day Partition**: The `YYYY-MM-DD` key that routes rows to files
//! - **Timestamp Encoding**: The fixed-offset string form of the stored `ts`
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization helpers
//!
//! ## Crate Boundary
//!
//! `dayfold-core` is the only crate allowed to define shared primitives.
//! The engine and CLI build on top of these types; nothing here touches
//! Parquet or the event wire format.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod day;
pub mod error;
pub mod observability;
pub mod timefmt;

// Re-export key types at crate root for ergonomics
pub use day::{Day, DayParseError, is_datetime_shape};
pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use timefmt::format_stored_ts;
