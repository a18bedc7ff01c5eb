//! Columnar batch sources for the sieve filtering engine.
//!
//! This crate focuses on:
//! - A small value model for columnar cells (`Value` / `ColumnType`).
//! - Bounded, re-iterable batch streams over a table (`BatchSource`);
//!   two passes over the same source yield identical batch boundaries
//!   and row order.
//! - Column projection, so an index-build pass decodes only the columns
//!   it needs.
//! - A materialized output table built incrementally (`TableBuilder`;
//!   never holds more than one input batch alongside the output).

#![forbid(unsafe_code)]

mod batch;
#[cfg(feature = "parquet")]
mod parquet;
mod source;
mod table;
mod types;

pub use crate::batch::Batch;
#[cfg(feature = "parquet")]
pub use crate::parquet::ParquetSource;
pub use crate::source::{BatchSource, MemorySource, SourceError};
pub use crate::table::{Table, TableBuilder};
pub use crate::types::{parse_date, ColumnSchema, ColumnType, Value};
