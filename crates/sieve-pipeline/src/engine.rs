#![forbid(unsafe_code)]

//! Boundary to the downstream SQL engine that consumes the filtered
//! tables. The pipeline never interprets SQL itself; it hands over fully
//! materialized tables and takes back the engine's own measurement.

use thiserror::Error;

use sieve_columnar::Table;

use crate::metrics::Measurement;

/// A materialized table paired with the name the query refers to it by.
#[derive(Clone, Debug)]
pub struct NamedTable {
    pub name: String,
    pub table: Table,
}

#[derive(Debug, Error)]
#[error("sql engine '{engine}' failed: {reason}")]
pub struct EngineError {
    pub engine: String,
    pub reason: String,
}

/// An engine registers the handed-over tables, runs the query, and
/// reports what the execution cost. Implementations wrap embedded
/// engines; tests substitute fakes.
pub trait SqlEngine {
    fn name(&self) -> &str;

    fn execute(&mut self, tables: &[NamedTable], query: &str) -> Result<Measurement, EngineError>;
}
