//! Streaming parser for decoded row-event text.
//!
//! The upstream extractor emits verbose decoded binlog statements, one
//! assignment per line:
//!
//! ```text
//! INSERT INTO `telemetry`.`readings`
//! SET
//!   @1=42
//!   @2=7
//!   @3='2025-01-02 03:04:05'
//!   @4=10.5
//!   @5=0
//!   @6=1735787045
//! ```
//!
//! A statement block starts at a header line for the configured table and
//! ends at the next statement header (any table's) or at end of input.
//! `SET` and `WHERE` section keywords are accepted in either order and
//! assignments are read regardless of which section they sit in, because
//! DELETE statements carry their row image under `WHERE` while INSERT and
//! UPDATE use `SET`.
//!
//! Only `@1` (primary key), `@3` (datetime), `@4` (value) and `@6`
//! (modification timestamp) are read; the column positions are fixed by the
//! upstream table schema. Malformed blocks fail the whole batch - the tool
//! is re-run after the input is fixed, and replay converges.

use std::fmt;
use std::io::BufRead;

use dayfold_core::day::is_datetime_shape;

use crate::error::{EngineError, Result};
use crate::event::RowEvent;

/// The fully-qualified `<database>.<table>` the reader filters for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTable {
    database: String,
    table: String,
}

impl TargetTable {
    /// Parses a `<database>.<table>` identifier.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidTable` if either part is empty, or the
    /// input holds backticks or extra dots.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || EngineError::InvalidTable {
            input: input.to_string(),
        };
        let (database, table) = input.split_once('.').ok_or_else(invalid)?;
        if database.is_empty()
            || table.is_empty()
            || table.contains('.')
            || input.contains('`')
        {
            return Err(invalid());
        }
        Ok(Self {
            database: database.to_string(),
            table: table.to_string(),
        })
    }

    /// Returns the database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Insert,
    Update,
    Delete,
}

/// Partial state of the statement block currently being read.
#[derive(Debug)]
struct Block {
    kind: BlockKind,
    header_line: u64,
    pk: Option<i64>,
    dt: Option<String>,
    /// `Some(None)` is an explicit SQL NULL in `@4`.
    value: Option<Option<f64>>,
    ts: Option<u64>,
}

impl Block {
    fn new(kind: BlockKind, header_line: u64) -> Self {
        Self {
            kind,
            header_line,
            pk: None,
            dt: None,
            value: None,
            ts: None,
        }
    }

    /// Validates the completed block and converts it into an event.
    fn finish(self) -> Result<RowEvent> {
        let line = self.header_line;
        let pk = self.pk.ok_or_else(|| EngineError::Parse {
            line,
            message: "statement block missing @1 primary key".to_string(),
        })?;
        let dt = self.dt.ok_or_else(|| EngineError::Parse {
            line,
            message: format!("block for pk {pk} missing @3 datetime"),
        })?;
        match self.kind {
            BlockKind::Delete => Ok(RowEvent::Delete { pk, dt }),
            BlockKind::Insert | BlockKind::Update => {
                let value = self.value.ok_or_else(|| EngineError::Parse {
                    line,
                    message: format!("block for pk {pk} missing @4 value"),
                })?;
                let ts = self.ts.ok_or_else(|| EngineError::Parse {
                    line,
                    message: format!("block for pk {pk} missing @6 timestamp"),
                })?;
                match self.kind {
                    BlockKind::Insert => Ok(RowEvent::Insert { pk, dt, value, ts }),
                    BlockKind::Update => Ok(RowEvent::Update { pk, dt, value, ts }),
                    BlockKind::Delete => unreachable!("delete handled above"),
                }
            }
        }
    }
}

/// What a trimmed input line means to the block state machine.
#[derive(Debug, Clone, Copy)]
enum LineKind {
    /// Blank line, section keyword, or anything else outside our grammar.
    Skip,
    /// Header opening a block for the configured table.
    OwnHeader(BlockKind),
    /// Header for some other table; ends the current block.
    ForeignHeader,
    /// An `@N=value` assignment line.
    Assignment,
}

/// Single-pass streaming reader yielding [`RowEvent`]s for one table.
///
/// Memory per event is O(1): one reused line buffer plus the partial block.
pub struct EventReader<R> {
    input: R,
    insert_header: String,
    update_header: String,
    delete_header: String,
    block: Option<Block>,
    line: String,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> EventReader<R> {
    /// Creates a reader filtering for `table` over `input`.
    pub fn new(input: R, table: &TargetTable) -> Self {
        let qualified = format!("`{}`.`{}`", table.database(), table.table());
        Self {
            input,
            insert_header: format!("INSERT INTO {qualified}"),
            update_header: format!("UPDATE {qualified}"),
            delete_header: format!("DELETE FROM {qualified}"),
            block: None,
            line: String::with_capacity(256),
            line_no: 0,
            done: false,
        }
    }

    /// Reads the next row event, or `None` at end of input.
    ///
    /// The final block is flushed when the stream ends.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Parse` for malformed assignments or incomplete
    /// blocks, per the fail-the-batch policy.
    pub fn next_event(&mut self) -> Result<Option<RowEvent>> {
        if self.done {
            return Ok(None);
        }
        loop {
            self.line.clear();
            let read = self.input.read_line(&mut self.line).map_err(|e| {
                EngineError::Parse {
                    line: self.line_no + 1,
                    message: format!("input read failed: {e}"),
                }
            })?;
            if read == 0 {
                self.done = true;
                return self.block.take().map(Block::finish).transpose();
            }
            self.line_no += 1;

            match self.classify_line() {
                LineKind::Skip => {}
                LineKind::OwnHeader(kind) => {
                    let flushed = self.block.take();
                    self.block = Some(Block::new(kind, self.line_no));
                    if let Some(block) = flushed {
                        return block.finish().map(Some);
                    }
                }
                LineKind::ForeignHeader => {
                    if let Some(block) = self.block.take() {
                        return block.finish().map(Some);
                    }
                }
                LineKind::Assignment => {
                    let Self {
                        ref line,
                        ref mut block,
                        line_no,
                        ..
                    } = *self;
                    if let Some(block) = block.as_mut() {
                        parse_assignment(block, trim_line(line), line_no)?;
                    }
                }
            }
        }
    }

    fn classify_line(&self) -> LineKind {
        let trimmed = trim_line(&self.line);
        if trimmed.is_empty() {
            LineKind::Skip
        } else if trimmed == self.insert_header {
            LineKind::OwnHeader(BlockKind::Insert)
        } else if trimmed == self.update_header {
            LineKind::OwnHeader(BlockKind::Update)
        } else if trimmed == self.delete_header {
            LineKind::OwnHeader(BlockKind::Delete)
        } else if is_row_statement_header(trimmed) {
            LineKind::ForeignHeader
        } else if trimmed.starts_with('@') {
            LineKind::Assignment
        } else {
            // SET, WHERE, comments, position markers - all ignored.
            LineKind::Skip
        }
    }
}

/// Strips the line ending, then leading/trailing spaces and tabs.
fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r']).trim_matches([' ', '\t'])
}

/// Returns true for any decoded row-statement header, regardless of table.
fn is_row_statement_header(trimmed: &str) -> bool {
    trimmed.starts_with("INSERT INTO `")
        || trimmed.starts_with("UPDATE `")
        || trimmed.starts_with("DELETE FROM `")
}

/// Parses an unsigned decimal integer; rejects empty input, any non-digit
/// character, and overflow.
fn parse_decimal_u64(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}

fn parse_assignment(block: &mut Block, trimmed: &str, line: u64) -> Result<()> {
    let Some((col, raw)) = trimmed.split_once('=') else {
        return Err(EngineError::Parse {
            line,
            message: format!("assignment '{trimmed}' missing '='"),
        });
    };
    let value = raw.trim_matches([' ', '\t']);

    match col {
        "@1" => {
            let pk = parse_decimal_u64(value).ok_or_else(|| EngineError::Parse {
                line,
                message: format!("non-numeric @1 primary key '{value}'"),
            })?;
            if pk == 0 {
                return Err(EngineError::Parse {
                    line,
                    message: "@1 primary key must be non-zero".to_string(),
                });
            }
            let pk = i64::try_from(pk).map_err(|_| EngineError::Parse {
                line,
                message: format!("@1 primary key {pk} exceeds signed 64-bit range"),
            })?;
            block.pk = Some(pk);
        }
        "@3" => {
            let unquoted = strip_single_quotes(value);
            if !is_datetime_shape(unquoted) {
                return Err(EngineError::Parse {
                    line,
                    message: format!("malformed @3 datetime '{value}'"),
                });
            }
            block.dt = Some(unquoted.to_string());
        }
        "@4" => {
            if value == "NULL" {
                block.value = Some(None);
            } else {
                let parsed: f64 = value.parse().map_err(|_| EngineError::Parse {
                    line,
                    message: format!("unparseable @4 value '{value}'"),
                })?;
                block.value = Some(Some(parsed));
            }
        }
        "@6" => {
            let ts = parse_decimal_u64(value).ok_or_else(|| EngineError::Parse {
                line,
                message: format!("non-numeric @6 timestamp '{value}'"),
            })?;
            block.ts = Some(ts);
        }
        // Other column positions are not part of the stored row.
        _ => {}
    }
    Ok(())
}

/// Strips one pair of outer single quotes, if present.
fn strip_single_quotes(s: &str) -> &str {
    if s.len() > 2 && s.starts_with('\'') && s.ends_with('\'') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(input: &str) -> EventReader<&[u8]> {
        let table = TargetTable::parse("telemetry.readings").expect("valid table");
        EventReader::new(input.as_bytes(), &table)
    }

    fn collect(input: &str) -> Vec<RowEvent> {
        let mut r = reader(input);
        let mut out = Vec::new();
        while let Some(event) = r.next_event().expect("parse") {
            out.push(event);
        }
        out
    }

    #[test]
    fn parses_insert_block() {
        let events = collect(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=42\n\
             \t@2=7\n\
             \t@3='2025-01-02 03:04:05'\n\
             \t@4=10.5\n\
             \t@5=0\n\
             \t@6=1735787045\n",
        );
        assert_eq!(
            events,
            vec![RowEvent::Insert {
                pk: 42,
                dt: "2025-01-02 03:04:05".to_string(),
                value: Some(10.5),
                ts: 1_735_787_045,
            }]
        );
    }

    #[test]
    fn delete_reads_row_image_under_where() {
        let events = collect(
            "DELETE FROM `telemetry`.`readings`\n\
             WHERE\n\
             \t@1=7\n\
             \t@3='2025-01-03 11:00:00'\n",
        );
        assert_eq!(
            events,
            vec![RowEvent::Delete {
                pk: 7,
                dt: "2025-01-03 11:00:00".to_string(),
            }]
        );
    }

    #[test]
    fn update_tolerates_where_then_set_layout() {
        // Before-image under WHERE, after-image under SET: later
        // assignments win, matching the single-block fold.
        let events = collect(
            "UPDATE `telemetry`.`readings`\n\
             WHERE\n\
             \t@1=9\n\
             \t@3='2025-01-02 03:04:05'\n\
             \t@4=1\n\
             \t@6=100\n\
             SET\n\
             \t@1=9\n\
             \t@3='2025-01-02 03:05:00'\n\
             \t@4=2\n\
             \t@6=160\n",
        );
        assert_eq!(
            events,
            vec![RowEvent::Update {
                pk: 9,
                dt: "2025-01-02 03:05:00".to_string(),
                value: Some(2.0),
                ts: 160,
            }]
        );
    }

    #[test]
    fn null_value_is_distinct_from_zero() {
        let events = collect(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=3\n\
             \t@3='2025-01-07 00:00:00'\n\
             \t@4=NULL\n\
             \t@6=1\n",
        );
        assert_eq!(
            events,
            vec![RowEvent::Insert {
                pk: 3,
                dt: "2025-01-07 00:00:00".to_string(),
                value: None,
                ts: 1,
            }]
        );
    }

    #[test]
    fn unquoted_datetime_is_accepted() {
        let events = collect(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=5\n\
             \t@3=2025-01-02 03:04:05\n\
             \t@4=1.0\n\
             \t@6=1\n",
        );
        assert_eq!(events[0].dt(), "2025-01-02 03:04:05");
    }

    #[test]
    fn other_tables_are_filtered_out() {
        let events = collect(
            "INSERT INTO `telemetry`.`other`\n\
             SET\n\
             \t@1=999\n\
             \t@3='2025-01-02 00:00:00'\n\
             \t@4=1\n\
             \t@6=1\n\
             INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=1\n\
             \t@3='2025-01-02 00:00:00'\n\
             \t@4=1\n\
             \t@6=1\n",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pk(), 1);
    }

    #[test]
    fn foreign_header_ends_our_block() {
        // A block for another table right after ours must not bleed its
        // assignments into our event.
        let events = collect(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=1\n\
             \t@3='2025-01-02 00:00:00'\n\
             \t@4=1\n\
             \t@6=1\n\
             UPDATE `telemetry`.`other`\n\
             SET\n\
             \t@1=999\n\
             \t@3='2099-12-31 00:00:00'\n\
             \t@4=7\n\
             \t@6=7\n",
        );
        assert_eq!(
            events,
            vec![RowEvent::Insert {
                pk: 1,
                dt: "2025-01-02 00:00:00".to_string(),
                value: Some(1.0),
                ts: 1,
            }]
        );
    }

    #[test]
    fn final_block_is_flushed_at_eof() {
        let events = collect(
            "UPDATE `telemetry`.`readings`\n\
             SET\n\
             \t@1=8\n\
             \t@3='2025-01-02 00:00:00'\n\
             \t@4=4.25\n\
             \t@6=50",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pk(), 8);
    }

    #[test]
    fn non_numeric_pk_fails_the_batch() {
        let mut r = reader(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=12x\n",
        );
        let err = r.next_event().expect_err("should fail");
        assert!(matches!(err, EngineError::Parse { line: 3, .. }), "{err}");
    }

    #[test]
    fn zero_pk_fails_the_batch() {
        let mut r = reader(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=0\n",
        );
        assert!(r.next_event().is_err());
    }

    #[test]
    fn missing_timestamp_fails_insert() {
        let mut r = reader(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=4\n\
             \t@3='2025-01-02 00:00:00'\n\
             \t@4=1\n",
        );
        let err = r.next_event().expect_err("should fail");
        assert!(err.to_string().contains("@6"), "{err}");
        assert!(err.to_string().contains("pk 4"), "{err}");
    }

    #[test]
    fn unparseable_value_fails_the_batch() {
        let mut r = reader(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=4\n\
             \t@3='2025-01-02 00:00:00'\n\
             \t@4=12,5\n",
        );
        assert!(r.next_event().is_err());
    }

    #[test]
    fn malformed_datetime_fails_the_batch() {
        let mut r = reader(
            "INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@1=4\n\
             \t@3='2025-01-02T00:00:00'\n",
        );
        assert!(r.next_event().is_err());
    }

    #[test]
    fn irrelevant_columns_and_blank_lines_are_ignored() {
        let events = collect(
            "\n\
             # at 4711\n\
             INSERT INTO `telemetry`.`readings`\n\
             SET\n\
             \t@2=gibberish that would not parse\n\
             \t@1=6\n\
             \n\
             \t@3='2025-01-02 00:00:00'\n\
             \t@4=0.0\n\
             \t@5=###\n\
             \t@6=1\n",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pk(), 6);
    }

    #[test]
    fn table_identifier_must_be_qualified() {
        assert!(TargetTable::parse("readings").is_err());
        assert!(TargetTable::parse(".readings").is_err());
        assert!(TargetTable::parse("db.").is_err());
        assert!(TargetTable::parse("db.schema.readings").is_err());
        assert!(TargetTable::parse("db.`readings`").is_err());
        let table = TargetTable::parse("db.readings").expect("valid");
        assert_eq!(table.to_string(), "db.readings");
    }
}
