#![forbid(unsafe_code)]

use crate::types::{ColumnSchema, Value};

/// A contiguous slice of a table's rows, column-major.
///
/// Consecutive batches from one reader pass form a strictly increasing,
/// gap-free partition of `[0, total_rows)`; the batch itself does not
/// carry its offset, callers keep the running offset.
#[derive(Clone, Debug)]
pub struct Batch {
    schema: Vec<ColumnSchema>,
    columns: Vec<Vec<Value>>,
    rows: usize,
}

impl Batch {
    /// Build a batch from projected columns. All columns must have the
    /// same length; a schema/column arity mismatch is a caller bug.
    pub fn new(schema: Vec<ColumnSchema>, columns: Vec<Vec<Value>>) -> Self {
        debug_assert_eq!(schema.len(), columns.len(), "schema/column arity mismatch");
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        debug_assert!(
            columns.iter().all(|c| c.len() == rows),
            "ragged batch columns"
        );
        Self {
            schema,
            columns,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        let idx = self.schema.iter().position(|c| c.name == name)?;
        self.columns.get(idx).map(Vec::as_slice)
    }

    pub fn column_at(&self, idx: usize) -> Option<&[Value]> {
        self.columns.get(idx).map(Vec::as_slice)
    }
}
