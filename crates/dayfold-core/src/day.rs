//! Day partition keys.
//!
//! A row is routed to exactly one calendar day, and each day corresponds to
//! one file on disk. The key is the first 10 characters (`YYYY-MM-DD`) of
//! the row's `date_time` string, cut without any timezone math so the
//! partitioning stays in exact correspondence with upstream calendaring.
//!
//! ```rust
//! use dayfold_core::Day;
//!
//! let day = Day::from_datetime("2025-01-02 03:04:05").unwrap();
//! assert_eq!(day.as_str(), "2025-01-02");
//! assert_eq!(day.file_name("parquet"), "2025-01-02.parquet");
//! ```

use std::fmt;

/// Byte length of a `YYYY-MM-DD` day key.
pub const DAY_LEN: usize = 10;

/// Byte length of a `YYYY-MM-DD HH:MM:SS` datetime string.
pub const DATETIME_LEN: usize = 19;

/// Errors from parsing day keys or datetime strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DayParseError {
    /// The input was not a `YYYY-MM-DD` day key.
    #[error("invalid day '{input}': expected YYYY-MM-DD")]
    InvalidDay {
        /// The rejected input.
        input: String,
    },

    /// The input was not a `YYYY-MM-DD HH:MM:SS` datetime.
    #[error("invalid datetime '{input}': expected YYYY-MM-DD HH:MM:SS")]
    InvalidDatetime {
        /// The rejected input.
        input: String,
    },
}

/// Returns true if `s` has the exact `YYYY-MM-DD HH:MM:SS` shape.
///
/// This is a shape check, not a calendar check: every position must hold the
/// right character class, but `2025-99-99 99:99:99` passes. The pipeline
/// treats datetimes as opaque strings and never does calendar math on them,
/// so the stored form is validated the same way it is routed.
#[must_use]
pub fn is_datetime_shape(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != DATETIME_LEN {
        return false;
    }
    if !is_day_shape(&s[..DAY_LEN]) {
        return false;
    }
    if b[10] != b' ' || b[13] != b':' || b[16] != b':' {
        return false;
    }
    [11, 12, 14, 15, 17, 18]
        .iter()
        .all(|&i| b[i].is_ascii_digit())
}

/// Returns true if `s` has the exact `YYYY-MM-DD` shape.
#[must_use]
pub fn is_day_shape(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != DAY_LEN {
        return false;
    }
    if b[4] != b'-' || b[7] != b'-' {
        return false;
    }
    [0, 1, 2, 3, 5, 6, 8, 9]
        .iter()
        .all(|&i| b[i].is_ascii_digit())
}

/// A calendar-day partition key (`YYYY-MM-DD`).
///
/// Ordering is lexicographic, which for this shape coincides with
/// chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Day(String);

impl Day {
    /// Parses a bare `YYYY-MM-DD` day key.
    ///
    /// # Errors
    ///
    /// Returns `DayParseError::InvalidDay` if the input does not have the
    /// day shape.
    pub fn parse(s: &str) -> Result<Self, DayParseError> {
        if is_day_shape(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(DayParseError::InvalidDay {
                input: s.to_string(),
            })
        }
    }

    /// Cuts the day key from a `YYYY-MM-DD HH:MM:SS` datetime string.
    ///
    /// # Errors
    ///
    /// Returns `DayParseError::InvalidDatetime` if the input does not have
    /// the full datetime shape.
    pub fn from_datetime(dt: &str) -> Result<Self, DayParseError> {
        if is_datetime_shape(dt) {
            Ok(Self(dt[..DAY_LEN].to_string()))
        } else {
            Err(DayParseError::InvalidDatetime {
                input: dt.to_string(),
            })
        }
    }

    /// Returns the day key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the file name for this day with the given extension.
    #[must_use]
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{ext}", self.0)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_prefix_becomes_day() {
        let day = Day::from_datetime("2025-01-05 23:59:59").expect("valid datetime");
        assert_eq!(day.as_str(), "2025-01-05");
        assert_eq!(day.file_name("parquet"), "2025-01-05.parquet");
    }

    #[test]
    fn shape_check_rejects_near_misses() {
        assert!(is_datetime_shape("2025-01-02 03:04:05"));
        assert!(!is_datetime_shape("2025-01-02T03:04:05"));
        assert!(!is_datetime_shape("2025-01-02 03:04:5"));
        assert!(!is_datetime_shape("2025-01-02 03:04:055"));
        assert!(!is_datetime_shape("2025/01/02 03:04:05"));
        assert!(!is_datetime_shape(""));
        // Shape only - impossible calendar values still pass.
        assert!(is_datetime_shape("2025-99-99 99:99:99"));
    }

    #[test]
    fn bare_day_parses() {
        assert!(Day::parse("2025-01-02").is_ok());
        assert!(Day::parse("2025-1-2").is_err());
        assert!(Day::parse("2025-01-02 ").is_err());
    }

    #[test]
    fn days_order_chronologically() {
        let a = Day::parse("2025-01-05").unwrap();
        let b = Day::parse("2025-01-06").unwrap();
        assert!(a < b);
    }

    #[test]
    fn consecutive_seconds_across_midnight_split_days() {
        let a = Day::from_datetime("2025-01-05 23:59:59").unwrap();
        let b = Day::from_datetime("2025-01-06 00:00:00").unwrap();
        assert_ne!(a, b);
    }
}
