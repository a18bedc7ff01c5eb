#![forbid(unsafe_code)]

use crate::batch::Batch;
use crate::types::{ColumnSchema, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {path}: {reason}")]
    Unavailable { path: String, reason: String },
    #[error("malformed batch: {0}")]
    Decode(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("ragged columns: '{column}' has {len} rows, expected {expected}")]
    RaggedColumns {
        column: String,
        len: usize,
        expected: usize,
    },
}

/// Sequential, re-iterable access to a table's rows in bounded batches.
///
/// Two independent passes over the same source must yield identical
/// batch boundaries and row order; the index-build pass and the
/// materialization pass rely on this to agree on row ids.
pub trait BatchSource {
    fn schema(&self) -> &[ColumnSchema];

    fn total_rows(&self) -> u64;

    /// Open a fresh pass. `projection` restricts which columns the pass
    /// decodes; `None` reads every column. Column order in each batch
    /// follows the projection when given, the source schema otherwise.
    fn batches(
        &self,
        projection: Option<&[&str]>,
    ) -> Result<Box<dyn Iterator<Item = Result<Batch, SourceError>> + '_>, SourceError>;
}

/// Resolve a projection against a schema, preserving projection order.
pub(crate) fn project_schema(
    schema: &[ColumnSchema],
    projection: Option<&[&str]>,
) -> Result<Vec<ColumnSchema>, SourceError> {
    match projection {
        None => Ok(schema.to_vec()),
        Some(names) => names
            .iter()
            .map(|name| {
                schema
                    .iter()
                    .find(|c| c.name == *name)
                    .cloned()
                    .ok_or_else(|| SourceError::UnknownColumn((*name).to_owned()))
            })
            .collect(),
    }
}

/// An in-memory, column-major source with a configurable batch size.
///
/// This is the reference implementation of the `BatchSource` contract
/// and the vehicle for batch-size-invariance tests: the same data read
/// with different `batch_size` values must index and materialize
/// identically.
pub struct MemorySource {
    schema: Vec<ColumnSchema>,
    columns: Vec<Vec<Value>>,
    rows: usize,
    batch_size: usize,
}

impl MemorySource {
    pub fn new(
        schema: Vec<ColumnSchema>,
        columns: Vec<Vec<Value>>,
        batch_size: usize,
    ) -> Result<Self, SourceError> {
        assert!(batch_size > 0, "batch_size must be positive");
        if schema.len() != columns.len() {
            return Err(SourceError::Decode(format!(
                "{} schema columns but {} data columns",
                schema.len(),
                columns.len()
            )));
        }
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        for (cs, col) in schema.iter().zip(&columns) {
            if col.len() != rows {
                return Err(SourceError::RaggedColumns {
                    column: cs.name.clone(),
                    len: col.len(),
                    expected: rows,
                });
            }
        }
        Ok(Self {
            schema,
            columns,
            rows,
            batch_size,
        })
    }

    /// Convenience constructor from row-major data.
    pub fn from_rows(
        schema: Vec<ColumnSchema>,
        rows: Vec<Vec<Value>>,
        batch_size: usize,
    ) -> Result<Self, SourceError> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); schema.len()];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(SourceError::Decode(format!(
                    "row {i} has {} cells, expected {}",
                    row.len(),
                    schema.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row.iter()) {
                col.push(value.clone());
            }
        }
        Self::new(schema, columns, batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Same data, different batching. Useful when asserting that results
    /// are independent of batch boundaries.
    pub fn with_batch_size(&self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self {
            schema: self.schema.clone(),
            columns: self.columns.clone(),
            rows: self.rows,
            batch_size,
        }
    }
}

impl BatchSource for MemorySource {
    fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    fn total_rows(&self) -> u64 {
        self.rows as u64
    }

    fn batches(
        &self,
        projection: Option<&[&str]>,
    ) -> Result<Box<dyn Iterator<Item = Result<Batch, SourceError>> + '_>, SourceError> {
        let schema = project_schema(&self.schema, projection)?;
        let col_indices: Vec<usize> = schema
            .iter()
            .map(|c| {
                self.schema
                    .iter()
                    .position(|s| s.name == c.name)
                    .expect("projected column resolved above")
            })
            .collect();

        let rows = self.rows;
        let batch_size = self.batch_size;
        let iter = (0..rows).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(rows);
            let columns: Vec<Vec<Value>> = col_indices
                .iter()
                .map(|&ci| self.columns[ci][start..end].to_vec())
                .collect();
            Ok(Batch::new(schema.clone(), columns))
        });
        Ok(Box::new(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    fn source(batch_size: usize) -> MemorySource {
        MemorySource::new(
            vec![ColumnSchema::new("x", ColumnType::Int)],
            vec![(0..10).map(Value::Int).collect()],
            batch_size,
        )
        .expect("valid source")
    }

    #[test]
    fn batches_partition_rows_without_gaps() {
        for batch_size in [1, 3, 4, 10, 100] {
            let src = source(batch_size);
            let mut seen = Vec::new();
            for batch in src.batches(None).expect("open pass") {
                let batch = batch.expect("batch");
                seen.extend(batch.column("x").expect("col").to_vec());
            }
            assert_eq!(seen, (0..10).map(Value::Int).collect::<Vec<_>>());
        }
    }

    #[test]
    fn two_passes_yield_identical_boundaries() {
        let src = source(3);
        let sizes = |s: &MemorySource| -> Vec<usize> {
            s.batches(None)
                .expect("open pass")
                .map(|b| b.expect("batch").row_count())
                .collect()
        };
        assert_eq!(sizes(&src), sizes(&src));
        assert_eq!(sizes(&src), vec![3, 3, 3, 1]);
    }

    #[test]
    fn projection_restricts_and_reorders_columns() {
        let src = MemorySource::new(
            vec![
                ColumnSchema::new("a", ColumnType::Int),
                ColumnSchema::new("b", ColumnType::Str),
            ],
            vec![
                vec![Value::Int(1), Value::Int(2)],
                vec![Value::str("x"), Value::str("y")],
            ],
            16,
        )
        .expect("valid source");

        let batch = src
            .batches(Some(&["b"]))
            .expect("open pass")
            .next()
            .expect("one batch")
            .expect("batch");
        assert_eq!(batch.schema().len(), 1);
        assert_eq!(batch.schema()[0].name, "b");
        assert!(batch.column("a").is_none());

        let unknown = src.batches(Some(&["nope"]));
        assert!(matches!(unknown, Err(SourceError::UnknownColumn(_))));
    }

    #[test]
    fn empty_source_yields_no_batches() {
        let src = MemorySource::new(
            vec![ColumnSchema::new("x", ColumnType::Int)],
            vec![Vec::new()],
            8,
        )
        .expect("valid source");
        assert_eq!(src.total_rows(), 0);
        assert_eq!(src.batches(None).expect("open pass").count(), 0);
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = MemorySource::new(
            vec![
                ColumnSchema::new("a", ColumnType::Int),
                ColumnSchema::new("b", ColumnType::Int),
            ],
            vec![vec![Value::Int(1)], vec![]],
            8,
        );
        assert!(matches!(err, Err(SourceError::RaggedColumns { .. })));
    }
}
