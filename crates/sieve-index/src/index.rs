#![forbid(unsafe_code)]

use crate::key::IndexKey;
use roaring::RoaringBitmap;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Inverted index for one column: distinct value -> bitmap of the row
/// ids holding that value.
///
/// Invariant: bucket bitmaps are pairwise disjoint and their union is
/// exactly the column's non-null rows. Keys are sorted, so range
/// queries walk only the qualifying key span instead of scanning the
/// whole key set.
#[derive(Clone, Debug, Default)]
pub struct ColumnIndex {
    buckets: BTreeMap<IndexKey, RoaringBitmap>,
}

impl ColumnIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: IndexKey, row: u32) {
        self.buckets.entry(key).or_default().insert(row);
    }

    pub fn get(&self, key: &IndexKey) -> Option<&RoaringBitmap> {
        self.buckets.get(key)
    }

    pub fn distinct_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &RoaringBitmap)> {
        self.buckets.iter()
    }

    /// Buckets whose key satisfies `lo <= key < hi`.
    pub fn range(
        &self,
        lo: &IndexKey,
        hi: &IndexKey,
    ) -> impl Iterator<Item = (&IndexKey, &RoaringBitmap)> {
        self.buckets
            .range((Bound::Included(lo.clone()), Bound::Excluded(hi.clone())))
    }

    /// Union of every bucket, i.e. all non-null rows of the column.
    pub fn union_all(&self) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        for bitmap in self.buckets.values() {
            out |= bitmap;
        }
        out
    }

    /// Serialized byte footprint of every bucket bitmap; used purely
    /// for memory reporting.
    pub fn serialized_size_bytes(&self) -> usize {
        self.buckets.values().map(|b| b.serialized_size()).sum()
    }

    /// True when the buckets partition their union (pairwise disjoint).
    /// A `false` here is a programming defect in the builder, not a
    /// recoverable runtime condition; tests assert it after every build.
    pub fn is_partition(&self) -> bool {
        let total: u64 = self.buckets.values().map(RoaringBitmap::len).sum();
        total == self.union_all().len()
    }
}

/// A built index artifact: either a plain bitmap (derived row-local
/// predicate) or a per-value column index.
#[derive(Clone, Debug)]
pub enum IndexEntry {
    Bitmap(RoaringBitmap),
    Column(ColumnIndex),
}

impl IndexEntry {
    pub fn serialized_size_bytes(&self) -> usize {
        match self {
            IndexEntry::Bitmap(b) => b.serialized_size(),
            IndexEntry::Column(c) => c.serialized_size_bytes(),
        }
    }

    pub fn as_column(&self) -> Option<&ColumnIndex> {
        match self {
            IndexEntry::Column(c) => Some(c),
            IndexEntry::Bitmap(_) => None,
        }
    }

    pub fn as_bitmap(&self) -> Option<&RoaringBitmap> {
        match self {
            IndexEntry::Bitmap(b) => Some(b),
            IndexEntry::Column(_) => None,
        }
    }
}
