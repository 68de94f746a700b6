//! Error types for engine operations.
//!
//! The policy is fail-the-batch: nothing is retried, no partial state is
//! written past the failing day, and the operator re-runs after fixing the
//! root cause. Convergence under replay makes the re-run safe.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while consolidating a batch.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input stream held a malformed statement block.
    #[error("parse error at input line {line}: {message}")]
    Parse {
        /// 1-based line number of the offending input line.
        line: u64,
        /// Description of what was malformed.
        message: String,
    },

    /// A parsed event was semantically unusable.
    #[error("invalid event for pk {pk}: {message}")]
    InvalidEvent {
        /// Primary key of the offending event.
        pk: i64,
        /// Description of the problem.
        message: String,
    },

    /// The configured table identifier was malformed.
    #[error("invalid table identifier '{input}': expected <database>.<table>")]
    InvalidTable {
        /// The rejected identifier.
        input: String,
    },

    /// A filesystem operation on a day file failed.
    #[error("storage error on {}: {source}", path.display())]
    Storage {
        /// Path of the file involved.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Parquet encoding or decoding failed.
    #[error("parquet error: {message}")]
    Parquet {
        /// Description of the Parquet failure.
        message: String,
    },

    /// An internal invariant did not hold.
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },
}

impl EngineError {
    /// Creates a storage error for the given path.
    #[must_use]
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
