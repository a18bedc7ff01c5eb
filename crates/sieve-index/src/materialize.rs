#![forbid(unsafe_code)]

use crate::build::IndexError;
use roaring::RoaringBitmap;
use sieve_columnar::{BatchSource, ColumnSchema, SourceError, Table, TableBuilder};

fn projected_schema(
    source: &dyn BatchSource,
    projection: Option<&[&str]>,
) -> Result<Vec<ColumnSchema>, SourceError> {
    match projection {
        None => Ok(source.schema().to_vec()),
        Some(names) => names
            .iter()
            .map(|name| {
                source
                    .schema()
                    .iter()
                    .find(|c| c.name == *name)
                    .cloned()
                    .ok_or_else(|| SourceError::UnknownColumn((*name).to_owned()))
            })
            .collect(),
    }
}

/// Extract exactly the rows in `rows` from a fresh pass over `source`.
///
/// Single merge pass: a cursor over the ascending bitmap is advanced
/// against the running batch window `[offset, offset + n)`; each
/// consumed id becomes the batch-local position `id - offset`. Work is
/// `O(total_rows + |rows|)` and reading stops as soon as the cursor is
/// exhausted; remaining batches are never decoded. Output rows keep
/// ascending row-id order, i.e. original file order. An empty bitmap
/// produces an empty table with the projected column set.
pub fn materialize(
    source: &dyn BatchSource,
    rows: &RoaringBitmap,
    projection: Option<&[&str]>,
) -> Result<Table, IndexError> {
    let schema = projected_schema(source, projection)?;
    let mut builder = TableBuilder::new(schema);

    let mut cursor = rows.iter().peekable();
    let mut offset: u64 = 0;
    let mut locals: Vec<usize> = Vec::new();

    let mut batches = source.batches(projection)?;
    // Checking the cursor before pulling the next batch keeps exhausted
    // tails entirely undecoded.
    while cursor.peek().is_some() {
        let Some(batch) = batches.next() else {
            break;
        };
        let batch = batch?;
        let end = offset + batch.row_count() as u64;

        locals.clear();
        while let Some(&id) = cursor.peek() {
            if (id as u64) >= end {
                break;
            }
            // Row ids only originate from valid reads; an id below the
            // current offset would mean the bitmap is not sorted.
            debug_assert!(id as u64 >= offset);
            locals.push((id as u64 - offset) as usize);
            cursor.next();
        }

        if !locals.is_empty() {
            builder.append_positions(&batch, &locals);
        }
        offset = end;
    }

    Ok(builder.finish())
}

/// Unfiltered scan into a materialized table (the full-universe case,
/// used for pass-through tables handed to the downstream engine).
pub fn scan(source: &dyn BatchSource, projection: Option<&[&str]>) -> Result<Table, IndexError> {
    let schema = projected_schema(source, projection)?;
    let mut builder = TableBuilder::new(schema);
    for batch in source.batches(projection)? {
        builder.append_batch(&batch?);
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sieve_columnar::{ColumnType, MemorySource, Value};

    fn source(batch_size: usize) -> MemorySource {
        MemorySource::new(
            vec![
                ColumnSchema::new("id", ColumnType::Int),
                ColumnSchema::new("flag", ColumnType::Str),
            ],
            vec![
                (0..10).map(Value::Int).collect(),
                ["A", "A", "B", "A", "B", "B", "A", "B", "A", "A"]
                    .iter()
                    .map(|s| Value::str(s))
                    .collect(),
            ],
            batch_size,
        )
        .expect("valid source")
    }

    fn bitmap(ids: &[u32]) -> RoaringBitmap {
        ids.iter().copied().collect()
    }

    #[test]
    fn output_cardinality_and_order_match_the_bitmap() {
        let rows = bitmap(&[0, 1, 3, 6, 8, 9]);
        let table = materialize(&source(3), &rows, None).expect("materialize");

        assert_eq!(table.row_count() as u64, rows.len());
        let ids: Vec<Value> = (0..table.row_count()).map(|r| table.get_cell(r, 0)).collect();
        assert_eq!(
            ids,
            rows.iter().map(|id| Value::Int(id as i64)).collect::<Vec<_>>()
        );
        assert!(table
            .column("flag")
            .expect("flag")
            .iter()
            .all(|v| *v == Value::str("A")));
    }

    #[test]
    fn materialization_is_batch_size_invariant() {
        let rows = bitmap(&[2, 4, 5, 7]);
        let reference = materialize(&source(10), &rows, None).expect("materialize");
        for batch_size in [1, 2, 3, 4, 100] {
            let table = materialize(&source(batch_size), &rows, None).expect("materialize");
            assert_eq!(table, reference, "batch_size={batch_size}");
        }
    }

    #[test]
    fn full_universe_round_trips_the_source() {
        let src = source(4);
        let mut universe = RoaringBitmap::new();
        universe.insert_range(0..src.total_rows() as u32);

        let via_bitmap = materialize(&src, &universe, None).expect("materialize");
        let via_scan = scan(&src, None).expect("scan");
        assert_eq!(via_bitmap, via_scan);
        assert_eq!(via_bitmap.row_count(), 10);
    }

    #[test]
    fn empty_bitmap_yields_empty_table_with_columns() {
        let table =
            materialize(&source(3), &RoaringBitmap::new(), Some(&["flag"])).expect("materialize");
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.schema()[0].name, "flag");
    }

    #[test]
    fn projection_limits_materialized_columns() {
        let table =
            materialize(&source(3), &bitmap(&[2, 7]), Some(&["flag"])).expect("materialize");
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.column("flag").expect("flag"),
            &[Value::str("B"), Value::str("B")]
        );
        assert!(table.column("id").is_none());
    }

    #[test]
    fn unknown_projected_column_is_an_error() {
        let err = materialize(&source(3), &bitmap(&[1]), Some(&["nope"]));
        assert!(matches!(
            err,
            Err(IndexError::Source(SourceError::UnknownColumn(_)))
        ));
    }
}
