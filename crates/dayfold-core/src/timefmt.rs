//! The stored-timestamp string encoding.
//!
//! Day files carry the row's modification time as a 19-character
//! `YYYY-MM-DD HH:MM:SS` string at a fixed UTC+2 offset. Downstream
//! consumers parse this column positionally, so the encoding is a
//! bit-exact contract: epoch seconds plus two hours, formatted, truncated
//! to 19 characters.

use chrono::{DateTime, FixedOffset};

use crate::error::{Error, Result};

/// The fixed offset applied to stored timestamps, in seconds east of UTC.
pub const STORED_TS_OFFSET_SECS: i32 = 2 * 3600;

/// Length of the stored timestamp string.
const STORED_TS_LEN: usize = 19;

/// Formats epoch seconds as the stored `ts` string.
///
/// `0` becomes `"1970-01-01 02:00:00"`. Values that format wider than 19
/// characters (years beyond 9999) are truncated, per the storage contract.
///
/// # Errors
///
/// Returns `Error::TimestampOutOfRange` if the value cannot be represented
/// as a calendar timestamp at all.
pub fn format_stored_ts(epoch_secs: u64) -> Result<String> {
    let secs =
        i64::try_from(epoch_secs).map_err(|_| Error::TimestampOutOfRange { value: epoch_secs })?;
    let utc = DateTime::from_timestamp(secs, 0)
        .ok_or(Error::TimestampOutOfRange { value: epoch_secs })?;

    // east_opt only fails for offsets outside +/-24h; ours is a constant.
    let offset = FixedOffset::east_opt(STORED_TS_OFFSET_SECS)
        .ok_or(Error::TimestampOutOfRange { value: epoch_secs })?;

    let mut formatted = utc
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    formatted.truncate(STORED_TS_LEN);
    Ok(formatted)
}
