//! Parquet encoding and decoding for derived tables.
//!
//! Tables are encoded one partition at a time; each call produces a
//! self-contained Parquet payload the writer places at its partition path.
//! Decoding exists for read-back verification in tests and tooling.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array as _, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::{EtlError, Result};
use crate::schema::{FieldType, RecordSchema};
use crate::table::{Table, Value};

/// Maps a declared record schema to its Arrow schema.
#[must_use]
pub fn arrow_schema(schema: &RecordSchema) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = schema
        .fields
        .iter()
        .map(|f| {
            let data_type = match f.data_type {
                FieldType::Int => DataType::Int32,
                FieldType::Long => DataType::Int64,
                FieldType::Double | FieldType::Decimal => DataType::Float64,
                FieldType::Utf8 => DataType::Utf8,
            };
            ArrowField::new(&f.name, data_type, f.nullable)
        })
        .collect();
    Arc::new(ArrowSchema::new(fields))
}

fn writer_properties() -> WriterProperties {
    // Keep properties minimal and widely compatible with external readers.
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("lyra-etl".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

fn column_array(table: &Table, col: usize) -> Result<ArrayRef> {
    let field = &table.schema().fields[col];
    let mismatch = |value: &Value| EtlError::Internal {
        message: format!(
            "column '{}' in table '{}' declared {:?} but holds {value:?}",
            field.name,
            table.name(),
            field.data_type
        ),
    };

    let array: ArrayRef = match field.data_type {
        FieldType::Int => {
            let mut values = Vec::with_capacity(table.num_rows());
            for row in table.rows() {
                values.push(match &row[col] {
                    Value::Null => None,
                    Value::Int(n) => Some(*n),
                    other => return Err(mismatch(other)),
                });
            }
            Arc::new(Int32Array::from(values))
        }
        FieldType::Long => {
            let mut values = Vec::with_capacity(table.num_rows());
            for row in table.rows() {
                values.push(match &row[col] {
                    Value::Null => None,
                    Value::Long(n) => Some(*n),
                    Value::Int(n) => Some(i64::from(*n)),
                    other => return Err(mismatch(other)),
                });
            }
            Arc::new(Int64Array::from(values))
        }
        FieldType::Double | FieldType::Decimal => {
            let mut values = Vec::with_capacity(table.num_rows());
            for row in table.rows() {
                values.push(match &row[col] {
                    Value::Null => None,
                    Value::Double(f) => Some(*f),
                    other => return Err(mismatch(other)),
                });
            }
            Arc::new(Float64Array::from(values))
        }
        FieldType::Utf8 => {
            let mut values = Vec::with_capacity(table.num_rows());
            for row in table.rows() {
                values.push(match &row[col] {
                    Value::Null => None,
                    Value::Utf8(s) => Some(s.clone()),
                    other => return Err(mismatch(other)),
                });
            }
            Arc::new(StringArray::from(values))
        }
    };
    Ok(array)
}

/// Encodes a table as a single-batch Parquet payload.
///
/// # Errors
///
/// Returns an error if a value does not match its declared column type, if
/// a non-nullable column holds a null, or if the Parquet write fails.
pub fn encode_table(table: &Table) -> Result<Bytes> {
    let schema = arrow_schema(table.schema());

    let mut columns = Vec::with_capacity(table.schema().fields.len());
    for col in 0..table.schema().fields.len() {
        columns.push(column_array(table, col)?);
    }

    let batch = RecordBatch::try_new(schema.clone(), columns).map_err(|e| EtlError::Parquet {
        message: format!("record batch build failed: {e}"),
    })?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties())).map_err(
        |e| EtlError::Parquet {
            message: format!("parquet writer init failed: {e}"),
        },
    )?;
    writer.write(&batch).map_err(|e| EtlError::Parquet {
        message: format!("parquet write failed: {e}"),
    })?;
    writer.close().map_err(|e| EtlError::Parquet {
        message: format!("parquet close failed: {e}"),
    })?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Decodes a Parquet payload back into a table with the given schema.
///
/// # Errors
///
/// Returns an error if the payload is invalid or a declared column is
/// missing or mistyped.
pub fn decode_table(bytes: &Bytes, name: &str, schema: &RecordSchema) -> Result<Table> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| EtlError::Parquet {
            message: format!("parquet reader init failed: {e}"),
        })?
        .build()
        .map_err(|e| EtlError::Parquet {
            message: format!("parquet reader build failed: {e}"),
        })?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| EtlError::Parquet {
            message: format!("parquet read batch failed: {e}"),
        })?;
        append_batch_rows(&batch, schema, &mut rows)?;
    }
    Ok(Table::new(name, schema.clone(), rows))
}

fn append_batch_rows(
    batch: &RecordBatch,
    schema: &RecordSchema,
    rows: &mut Vec<Vec<Value>>,
) -> Result<()> {
    let mut columns = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let idx = batch
            .schema()
            .index_of(&field.name)
            .map_err(|e| EtlError::Parquet {
                message: format!("missing column '{}': {e}", field.name),
            })?;
        columns.push((field.data_type, batch.column(idx).clone()));
    }

    for row in 0..batch.num_rows() {
        let mut out = Vec::with_capacity(columns.len());
        for (data_type, array) in &columns {
            out.push(read_value(*data_type, array, row)?);
        }
        rows.push(out);
    }
    Ok(())
}

fn read_value(data_type: FieldType, array: &ArrayRef, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let cast_failed = |expected: &str| EtlError::Parquet {
        message: format!("column is not {expected}"),
    };

    let value = match data_type {
        FieldType::Int => Value::Int(
            array
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(|| cast_failed("Int32Array"))?
                .value(row),
        ),
        FieldType::Long => Value::Long(
            array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| cast_failed("Int64Array"))?
                .value(row),
        ),
        FieldType::Double | FieldType::Decimal => Value::Double(
            array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| cast_failed("Float64Array"))?
                .value(row),
        ),
        FieldType::Utf8 => Value::Utf8(
            array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| cast_failed("StringArray"))?
                .value(row)
                .to_string(),
        ),
    };
    Ok(value)
}
