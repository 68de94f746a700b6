//! Error types and result aliases for dayfold.
//!
//! This module defines the shared error types used by the core primitives.
//! The engine layers its own error enum on top of these.

/// The result type used by dayfold-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A datetime or day string did not have the expected shape.
    #[error("invalid datetime: {message}")]
    InvalidDatetime {
        /// Description of what made the string invalid.
        message: String,
    },

    /// A timestamp could not be represented in the stored encoding.
    #[error("timestamp out of range: {value}")]
    TimestampOutOfRange {
        /// The offending epoch-seconds value.
        value: u64,
    },
}

impl Error {
    /// Creates a new invalid-datetime error with the given message.
    #[must_use]
    pub fn invalid_datetime(message: impl Into<String>) -> Self {
        Self::InvalidDatetime {
            message: message.into(),
        }
    }
}
