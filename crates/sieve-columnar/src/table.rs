#![forbid(unsafe_code)]

use crate::batch::Batch;
use crate::types::{ColumnSchema, Value};

/// A fully materialized, in-memory result table, column-major.
///
/// Row order always matches the order rows were appended, which for
/// bitmap materialization means ascending row id, i.e. original file
/// order.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    schema: Vec<ColumnSchema>,
    columns: Vec<Vec<Value>>,
    rows: usize,
}

impl Table {
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        let idx = self.schema.iter().position(|c| c.name == name)?;
        self.columns.get(idx).map(Vec::as_slice)
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Value {
        self.columns
            .get(col)
            .and_then(|c| c.get(row))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Streaming builder for [`Table`]: appends batch rows (or selected
/// positions within a batch) without ever holding more than one input
/// batch alongside the output.
pub struct TableBuilder {
    schema: Vec<ColumnSchema>,
    columns: Vec<Vec<Value>>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(schema: Vec<ColumnSchema>) -> Self {
        let columns = vec![Vec::new(); schema.len()];
        Self {
            schema,
            columns,
            rows: 0,
        }
    }

    /// Append every row of `batch`. The batch's projected schema must
    /// match the builder's schema.
    pub fn append_batch(&mut self, batch: &Batch) {
        debug_assert_eq!(batch.schema(), self.schema.as_slice(), "schema drift");
        for (out, idx) in self.columns.iter_mut().zip(0..) {
            if let Some(values) = batch.column_at(idx) {
                out.extend_from_slice(values);
            }
        }
        self.rows += batch.row_count();
    }

    /// Append only the given batch-local positions, in the given order.
    pub fn append_positions(&mut self, batch: &Batch, positions: &[usize]) {
        debug_assert_eq!(batch.schema(), self.schema.as_slice(), "schema drift");
        for (out, idx) in self.columns.iter_mut().zip(0..) {
            if let Some(values) = batch.column_at(idx) {
                out.extend(positions.iter().map(|&p| values[p].clone()));
            }
        }
        self.rows += positions.len();
    }

    pub fn finish(self) -> Table {
        Table {
            schema: self.schema,
            columns: self.columns,
            rows: self.rows,
        }
    }
}
