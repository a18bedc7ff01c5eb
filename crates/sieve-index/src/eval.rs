#![forbid(unsafe_code)]

use crate::index::ColumnIndex;
use crate::key::IndexKey;
use roaring::RoaringBitmap;

/// Rows holding exactly `key`. An absent key is an expected outcome and
/// yields an empty bitmap, never an error.
pub fn equals(index: &ColumnIndex, key: &IndexKey) -> RoaringBitmap {
    index.get(key).cloned().unwrap_or_default()
}

/// Rows whose key satisfies `lo <= key < hi`. Walks only the sorted key
/// span, so cost scales with the distinct values inside the window,
/// not the table's row count.
pub fn range(index: &ColumnIndex, lo: &IndexKey, hi: &IndexKey) -> RoaringBitmap {
    let mut out = RoaringBitmap::new();
    for (_, bitmap) in index.range(lo, hi) {
        out |= bitmap;
    }
    out
}

/// N-ary intersection, smallest bitmap first so the running result
/// shrinks as early as possible. An empty operand list is empty: with
/// no universe in scope there is nothing to select.
pub fn and_all<'a>(bitmaps: impl IntoIterator<Item = &'a RoaringBitmap>) -> RoaringBitmap {
    let mut ordered: Vec<&RoaringBitmap> = bitmaps.into_iter().collect();
    ordered.sort_by_key(|b| b.len());

    let mut iter = ordered.into_iter();
    let Some(first) = iter.next() else {
        return RoaringBitmap::new();
    };
    let mut out = first.clone();
    for bitmap in iter {
        if out.is_empty() {
            break;
        }
        out &= bitmap;
    }
    out
}

/// N-ary union.
pub fn or_all<'a>(bitmaps: impl IntoIterator<Item = &'a RoaringBitmap>) -> RoaringBitmap {
    let mut out = RoaringBitmap::new();
    for bitmap in bitmaps {
        out |= bitmap;
    }
    out
}

/// Complement against the universe `[0, universe_rows)`.
pub fn not(bitmap: &RoaringBitmap, universe_rows: u32) -> RoaringBitmap {
    let mut universe = RoaringBitmap::new();
    universe.insert_range(0..universe_rows);
    universe - bitmap
}

/// Bitmap semi-join: rows of the indexed table whose key has at least
/// one surviving row in `target`.
///
/// `key_index` is built over table A keyed by the join column; `target`
/// is a bitmap over table B's row id space (typically the other side's
/// evaluated filter joined through the same key domain). Every key
/// bucket that intersects `target` contributes its own rows.
pub fn semi_join(key_index: &ColumnIndex, target: &RoaringBitmap) -> RoaringBitmap {
    let mut out = RoaringBitmap::new();
    for (_, bucket) in key_index.iter() {
        if !bucket.is_disjoint(target) {
            out |= bucket;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bitmap(ids: &[u32]) -> RoaringBitmap {
        ids.iter().copied().collect()
    }

    fn int_index(pairs: &[(i64, &[u32])]) -> ColumnIndex {
        let mut index = ColumnIndex::new();
        for (key, rows) in pairs {
            for row in *rows {
                index.insert(IndexKey::int(*key), *row);
            }
        }
        index
    }

    #[test]
    fn equals_of_absent_key_is_empty() {
        let index = int_index(&[(1, &[0, 2])]);
        assert_eq!(equals(&index, &IndexKey::int(1)), bitmap(&[0, 2]));
        assert!(equals(&index, &IndexKey::int(9)).is_empty());
    }

    #[test]
    fn range_is_half_open() {
        let index = int_index(&[(10, &[0]), (20, &[1]), (30, &[2]), (40, &[3])]);
        assert_eq!(range(&index, &IndexKey::int(20), &IndexKey::int(40)), bitmap(&[1, 2]));
        assert!(range(&index, &IndexKey::int(41), &IndexKey::int(100)).is_empty());
        // Empty window.
        assert!(range(&index, &IndexKey::int(30), &IndexKey::int(30)).is_empty());
    }

    #[test]
    fn set_laws_hold() {
        let a = bitmap(&[0, 1, 2, 5, 8]);
        let b = bitmap(&[1, 2, 3]);
        let c = bitmap(&[2, 5, 9]);
        let universe = 10;

        // A & (B | C) == (A & B) | (A & C)
        let left = and_all([&a, &or_all([&b, &c])]);
        let right = or_all([&and_all([&a, &b]), &and_all([&a, &c])]);
        assert_eq!(left, right);

        // not(not(A)) == A against a fixed universe.
        assert_eq!(not(&not(&a, universe), universe), a);

        // Idempotence and identity.
        assert_eq!(and_all([&a, &a]), a);
        assert_eq!(or_all([&a, &RoaringBitmap::new()]), a);
    }

    #[test]
    fn and_all_order_does_not_change_the_result() {
        let a = bitmap(&[0, 1, 2, 3, 4, 5, 6, 7]);
        let b = bitmap(&[2, 3]);
        let c = bitmap(&[1, 2, 3, 4]);
        assert_eq!(and_all([&a, &b, &c]), and_all([&c, &a, &b]));
        assert_eq!(and_all([&a, &b, &c]), bitmap(&[2, 3]));
    }

    #[test]
    fn semi_join_matches_nested_loop_reference() {
        // Five orders keyed 1..=5; each lines row carries an order key.
        let order_keys: Vec<i64> = vec![1, 2, 3, 4, 5];
        let line_keys: Vec<i64> = vec![1, 2, 2, 3, 4, 5, 5, 5];
        // Lines surviving some upstream filter: rows 1 and 2 (key 2)
        // plus row 4 (key 4).
        let lines_bitmap = bitmap(&[1, 2, 4]);

        let mut orders_key_index = ColumnIndex::new();
        for (row, key) in order_keys.iter().enumerate() {
            orders_key_index.insert(IndexKey::int(*key), row as u32);
        }
        // The semi-join target lives in the key domain: map surviving
        // line rows through their keys into the orders key index.
        let surviving_keys: Vec<i64> = lines_bitmap
            .iter()
            .map(|row| line_keys[row as usize])
            .collect();
        let mut target = RoaringBitmap::new();
        for key in &surviving_keys {
            target |= equals(&orders_key_index, &IndexKey::int(*key));
        }

        let joined = semi_join(&orders_key_index, &target);

        // Brute-force nested loop over the same inputs.
        let mut expected = RoaringBitmap::new();
        for (order_row, order_key) in order_keys.iter().enumerate() {
            for line_row in lines_bitmap.iter() {
                if line_keys[line_row as usize] == *order_key {
                    expected.insert(order_row as u32);
                }
            }
        }

        assert_eq!(joined, expected);
        assert_eq!(joined.iter().collect::<Vec<u32>>(), vec![1, 3]); // orders 2 and 4
    }
}
