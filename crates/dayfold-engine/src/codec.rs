//! Parquet encoding/decoding for day files.
//!
//! This module defines the canonical schema of a `<YYYY-MM-DD>.parquet`
//! partition. The schema is the contract for every downstream consumer of
//! the dataset (exports, audits, ad-hoc readers); column order, types and
//! nullability are fixed:
//!
//! 1. `id`        - signed 64-bit integer, not null
//! 2. `date_time` - UTF-8, not null, `YYYY-MM-DD HH:MM:SS`
//! 3. `value`     - 64-bit float, nullable
//! 4. `ts`        - UTF-8, not null, `YYYY-MM-DD HH:MM:SS` at UTC+2
//!
//! Files are SNAPPY-compressed with row groups sized toward ~1 MiB of
//! uncompressed data.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array as _, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::{EngineError, Result};
use crate::event::RowValue;

/// File extension of a day partition.
pub const DAY_FILE_EXT: &str = "parquet";

/// Uncompressed row-group size target, in bytes.
const TARGET_ROW_GROUP_BYTES: usize = 1 << 20;

/// Estimated uncompressed width of one row: two 19-char strings with
/// offsets, one i64, one nullable f64.
const EST_ROW_BYTES: usize = 64;

fn day_rows_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("date_time", DataType::Utf8, false),
        Field::new("value", DataType::Float64, true),
        Field::new("ts", DataType::Utf8, false),
    ]))
}

/// Returns the day-file schema for external comparison.
#[must_use]
pub fn day_file_schema() -> Schema {
    (*day_rows_schema()).clone()
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("dayfold".to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(TARGET_ROW_GROUP_BYTES / EST_ROW_BYTES)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encodes rows into a complete Parquet day file.
///
/// Rows are written in the order given; the writer sorts by `id` before
/// calling this.
///
/// # Errors
///
/// Returns an error if the record batch cannot be built or the Parquet
/// write fails.
pub fn write_day_rows(rows: &[RowValue]) -> Result<Bytes> {
    let schema = day_rows_schema();

    let ids = Int64Array::from(rows.iter().map(|r| r.id).collect::<Vec<_>>());
    let date_times = StringArray::from(
        rows.iter()
            .map(|r| Some(r.date_time.as_str()))
            .collect::<Vec<_>>(),
    );
    let values = Float64Array::from(rows.iter().map(|r| r.value).collect::<Vec<_>>());
    let timestamps = StringArray::from(rows.iter().map(|r| Some(r.ts.as_str())).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(ids),
            Arc::new(date_times),
            Arc::new(values),
            Arc::new(timestamps),
        ],
    )
    .map_err(|e| EngineError::Parquet {
        message: format!("record batch build failed: {e}"),
    })?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer =
        ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties())).map_err(|e| {
            EngineError::Parquet {
                message: format!("parquet writer init failed: {e}"),
            }
        })?;
    writer.write(&batch).map_err(|e| EngineError::Parquet {
        message: format!("parquet write failed: {e}"),
    })?;
    writer.close().map_err(|e| EngineError::Parquet {
        message: format!("parquet close failed: {e}"),
    })?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Decodes a day file into its rows.
///
/// # Errors
///
/// Returns an error if the Parquet payload is invalid or required columns
/// are missing.
pub fn read_day_rows(bytes: &Bytes) -> Result<Vec<RowValue>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| EngineError::Parquet {
            message: format!("parquet reader init failed: {e}"),
        })?
        .build()
        .map_err(|e| EngineError::Parquet {
            message: format!("parquet reader build failed: {e}"),
        })?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| EngineError::Parquet {
            message: format!("parquet read batch failed: {e}"),
        })?;
        let id = col_i64(&batch, "id")?;
        let date_time = col_string(&batch, "date_time")?;
        let value = col_f64(&batch, "value")?;
        let ts = col_string(&batch, "ts")?;

        out.reserve(batch.num_rows());
        for row in 0..batch.num_rows() {
            out.push(RowValue {
                id: id.value(row),
                date_time: date_time.value(row).to_string(),
                value: if value.is_null(row) {
                    None
                } else {
                    Some(value.value(row))
                },
                ts: ts.value(row).to_string(),
            });
        }
    }
    Ok(out)
}

fn col_i64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|e| EngineError::InvariantViolation {
            message: format!("missing column '{name}': {e}"),
        })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| EngineError::InvariantViolation {
            message: format!("column '{name}' is not Int64Array"),
        })
}

fn col_string<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|e| EngineError::InvariantViolation {
            message: format!("missing column '{name}': {e}"),
        })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| EngineError::InvariantViolation {
            message: format!("column '{name}' is not StringArray"),
        })
}

fn col_f64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|e| EngineError::InvariantViolation {
            message: format!("missing column '{name}': {e}"),
        })?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| EngineError::InvariantViolation {
            message: format!("column '{name}' is not Float64Array"),
        })
}
