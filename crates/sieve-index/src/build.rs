#![forbid(unsafe_code)]

use crate::index::ColumnIndex;
use crate::key::IndexKey;
use roaring::RoaringBitmap;
use sieve_columnar::{Batch, BatchSource, SourceError};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("column '{0}' not present in batch")]
    MissingColumn(String),
    #[error("row id {0} does not fit the 32-bit bitmap key space")]
    RowIdOverflow(u64),
    #[error("derived mask has {mask} entries for a {rows}-row batch")]
    DerivedMaskLength { mask: usize, rows: usize },
}

/// Build-side bookkeeping for reporting: wall-clock build duration and
/// the byte estimate of the raw source column(s) the index replaces,
/// kept per column so a column read by several builds counts once.
#[derive(Clone, Debug, Default)]
pub struct BuildStats {
    pub build_time: Duration,
    pub column_bytes: BTreeMap<String, u64>,
}

impl BuildStats {
    pub fn source_bytes(&self) -> u64 {
        self.column_bytes.values().sum()
    }
}

fn row_id(offset: u64, local: usize) -> Result<u32, IndexError> {
    let id = offset + local as u64;
    u32::try_from(id).map_err(|_| IndexError::RowIdOverflow(id))
}

/// Build an equality index over one column in a single batch pass.
///
/// Maintains a running global offset: for every non-null cell, row id
/// `offset + local` joins that value's bucket. An empty source yields
/// an empty index, not an error.
pub fn build_column_index(
    source: &dyn BatchSource,
    column: &str,
) -> Result<(ColumnIndex, BuildStats), IndexError> {
    let started = Instant::now();
    let mut index = ColumnIndex::new();
    let mut offset: u64 = 0;
    let mut source_bytes: u64 = 0;

    for batch in source.batches(Some(&[column]))? {
        let batch = batch?;
        let values = batch
            .column(column)
            .ok_or_else(|| IndexError::MissingColumn(column.to_owned()))?;
        for (local, value) in values.iter().enumerate() {
            source_bytes += value.byte_estimate() as u64;
            if let Some(key) = IndexKey::from_value(value) {
                index.insert(key, row_id(offset, local)?);
            }
        }
        offset += batch.row_count() as u64;
    }

    debug_assert!(index.is_partition(), "value buckets must stay disjoint");
    Ok((
        index,
        BuildStats {
            build_time: started.elapsed(),
            column_bytes: BTreeMap::from([(column.to_owned(), source_bytes)]),
        },
    ))
}

/// Build equality indices for several columns of the same source in one
/// batch pass (one sequential read instead of one per column).
pub fn build_column_indexes(
    source: &dyn BatchSource,
    columns: &[&str],
) -> Result<(BTreeMap<String, ColumnIndex>, BuildStats), IndexError> {
    let started = Instant::now();
    let mut indexes: BTreeMap<String, ColumnIndex> = columns
        .iter()
        .map(|c| ((*c).to_owned(), ColumnIndex::new()))
        .collect();
    let mut offset: u64 = 0;
    let mut column_bytes: BTreeMap<String, u64> = BTreeMap::new();

    if columns.is_empty() {
        return Ok((indexes, BuildStats::default()));
    }

    for batch in source.batches(Some(columns))? {
        let batch = batch?;
        for column in columns {
            let values = batch
                .column(column)
                .ok_or_else(|| IndexError::MissingColumn((*column).to_owned()))?;
            let index = indexes
                .get_mut(*column)
                .expect("index pre-created per column");
            let bytes = column_bytes.entry((*column).to_owned()).or_default();
            for (local, value) in values.iter().enumerate() {
                *bytes += value.byte_estimate() as u64;
                if let Some(key) = IndexKey::from_value(value) {
                    index.insert(key, row_id(offset, local)?);
                }
            }
        }
        offset += batch.row_count() as u64;
    }

    debug_assert!(indexes.values().all(ColumnIndex::is_partition));
    Ok((
        indexes,
        BuildStats {
            build_time: started.elapsed(),
            column_bytes,
        },
    ))
}

/// Build a single bitmap from a row-local boolean expression (e.g. an
/// inter-column comparison). No value dictionary is kept; the predicate
/// sees one projected batch at a time and returns its boolean mask.
pub fn build_derived_bitmap(
    source: &dyn BatchSource,
    columns: &[&str],
    predicate: impl Fn(&Batch) -> Vec<bool>,
) -> Result<(RoaringBitmap, BuildStats), IndexError> {
    let started = Instant::now();
    let mut bitmap = RoaringBitmap::new();
    let mut offset: u64 = 0;
    let mut column_bytes: BTreeMap<String, u64> = BTreeMap::new();

    for batch in source.batches(Some(columns))? {
        let batch = batch?;
        let rows = batch.row_count();
        for column in columns {
            let values = batch
                .column(column)
                .ok_or_else(|| IndexError::MissingColumn((*column).to_owned()))?;
            *column_bytes.entry((*column).to_owned()).or_default() +=
                values.iter().map(|v| v.byte_estimate() as u64).sum::<u64>();
        }

        let mask = predicate(&batch);
        if mask.len() != rows {
            return Err(IndexError::DerivedMaskLength {
                mask: mask.len(),
                rows,
            });
        }
        for (local, hit) in mask.iter().enumerate() {
            if *hit {
                bitmap.insert(row_id(offset, local)?);
            }
        }
        offset += rows as u64;
    }

    Ok((
        bitmap,
        BuildStats {
            build_time: started.elapsed(),
            column_bytes,
        },
    ))
}
