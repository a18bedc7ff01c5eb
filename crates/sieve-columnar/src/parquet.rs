#![forbid(unsafe_code)]

use crate::batch::Batch;
use crate::source::{project_schema, BatchSource, SourceError};
use crate::types::{ColumnSchema, ColumnType, Value};
use arrow_array::types::Int32Type;
use arrow_array::{
    Array, BooleanArray, Date32Array, DictionaryArray, Float32Array, Float64Array, Int32Array,
    Int64Array, LargeStringArray, RecordBatch, StringArray,
};
use arrow_schema::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A Parquet-file batch source.
///
/// Each [`BatchSource::batches`] call opens a fresh reader over the
/// same file; Parquet row groups decode in file order, so batch
/// boundaries and row order are identical across passes as long as the
/// file is not rewritten.
pub struct ParquetSource {
    path: PathBuf,
    schema: Vec<ColumnSchema>,
    total_rows: u64,
    batch_size: usize,
}

impl ParquetSource {
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self, SourceError> {
        assert!(batch_size > 0, "batch_size must be positive");
        let path = path.as_ref().to_path_buf();
        let builder = reader_builder(&path)?;

        let schema = builder
            .schema()
            .fields()
            .iter()
            .map(|field| {
                Ok(ColumnSchema::new(
                    field.name().clone(),
                    column_type_for(field.data_type())?,
                ))
            })
            .collect::<Result<Vec<_>, SourceError>>()?;
        let total_rows = builder.metadata().file_metadata().num_rows().max(0) as u64;

        Ok(Self {
            path,
            schema,
            total_rows,
            batch_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BatchSource for ParquetSource {
    fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    fn total_rows(&self) -> u64 {
        self.total_rows
    }

    fn batches(
        &self,
        projection: Option<&[&str]>,
    ) -> Result<Box<dyn Iterator<Item = Result<Batch, SourceError>> + '_>, SourceError> {
        let schema = project_schema(&self.schema, projection)?;
        let builder = reader_builder(&self.path)?;

        // ProjectionMask keeps file column order; batches are reordered
        // to projection order after decoding.
        let roots: Vec<usize> = schema
            .iter()
            .map(|c| {
                self.schema
                    .iter()
                    .position(|s| s.name == c.name)
                    .expect("projected column resolved above")
            })
            .collect();
        let mask = ProjectionMask::roots(builder.parquet_schema(), roots.iter().copied());

        let reader = builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let iter = reader.map(move |record_batch| {
            let record_batch = record_batch.map_err(|e| SourceError::Decode(e.to_string()))?;
            convert_record_batch(&schema, &record_batch)
        });
        Ok(Box::new(iter))
    }
}

fn reader_builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>, SourceError> {
    let unavailable = |reason: String| SourceError::Unavailable {
        path: path.display().to_string(),
        reason,
    };
    let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| unavailable(e.to_string()))
}

fn column_type_for(data_type: &DataType) -> Result<ColumnType, SourceError> {
    match data_type {
        DataType::Boolean => Ok(ColumnType::Bool),
        DataType::Int32 | DataType::Int64 => Ok(ColumnType::Int),
        DataType::Float32 | DataType::Float64 => Ok(ColumnType::Float),
        DataType::Utf8 | DataType::LargeUtf8 => Ok(ColumnType::Str),
        DataType::Date32 => Ok(ColumnType::Date),
        DataType::Dictionary(_, values) if matches!(**values, DataType::Utf8) => {
            Ok(ColumnType::Str)
        }
        other => Err(SourceError::Decode(format!(
            "unsupported column type {other}"
        ))),
    }
}

fn convert_record_batch(
    schema: &[ColumnSchema],
    record_batch: &RecordBatch,
) -> Result<Batch, SourceError> {
    let columns = schema
        .iter()
        .map(|c| {
            let idx = record_batch
                .schema()
                .index_of(&c.name)
                .map_err(|e| SourceError::Decode(e.to_string()))?;
            convert_array(&c.name, record_batch.column(idx))
        })
        .collect::<Result<Vec<_>, SourceError>>()?;
    Ok(Batch::new(schema.to_vec(), columns))
}

fn convert_array(name: &str, array: &dyn Array) -> Result<Vec<Value>, SourceError> {
    fn cells<A: Array, T>(
        array: &A,
        get: impl Fn(&A, usize) -> T,
        wrap: impl Fn(T) -> Value,
    ) -> Vec<Value> {
        (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Value::Null
                } else {
                    wrap(get(array, i))
                }
            })
            .collect()
    }

    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<BooleanArray>() {
        return Ok(cells(a, |a, i| a.value(i), Value::Bool));
    }
    if let Some(a) = any.downcast_ref::<Int32Array>() {
        return Ok(cells(a, |a, i| a.value(i) as i64, Value::Int));
    }
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Ok(cells(a, |a, i| a.value(i), Value::Int));
    }
    if let Some(a) = any.downcast_ref::<Float32Array>() {
        return Ok(cells(a, |a, i| a.value(i) as f64, Value::Float));
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Ok(cells(a, |a, i| a.value(i), Value::Float));
    }
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Ok(cells(a, |a, i| Arc::<str>::from(a.value(i)), Value::Str));
    }
    if let Some(a) = any.downcast_ref::<LargeStringArray>() {
        return Ok(cells(a, |a, i| Arc::<str>::from(a.value(i)), Value::Str));
    }
    if let Some(a) = any.downcast_ref::<Date32Array>() {
        return Ok(cells(a, |a, i| a.value(i) as i64, Value::Date));
    }
    if let Some(a) = any.downcast_ref::<DictionaryArray<Int32Type>>() {
        let values = a
            .values()
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                SourceError::Decode(format!("column '{name}': non-utf8 dictionary values"))
            })?;
        return Ok((0..a.len())
            .map(|i| {
                if a.is_null(i) {
                    Value::Null
                } else {
                    Value::Str(Arc::<str>::from(values.value(a.key(i).unwrap_or(0))))
                }
            })
            .collect());
    }

    Err(SourceError::Decode(format!(
        "column '{name}': unsupported array type {}",
        array.data_type()
    )))
}
