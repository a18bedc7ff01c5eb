//! Bitmap-indexed row filtering over out-of-core batch sources.
//!
//! The crate splits into three layers:
//! - `build`: stream batches once, producing per-column inverted
//!   indices (`ColumnIndex`: value -> bitmap of row ids) and derived
//!   bitmaps for row-local boolean expressions.
//! - `eval`: pure set algebra over bitmaps and indices; no I/O, no
//!   state, trivially testable.
//! - `materialize`: a single merge pass over the source and a sorted
//!   bitmap, reconstructing exactly the selected rows.
//!
//! Row ids are `u32` positions in file order (`roaring::RoaringBitmap`
//! key space); they are only meaningful against the read pass that
//! produced them.

#![forbid(unsafe_code)]

mod build;
mod eval;
mod index;
mod key;
mod materialize;

pub use crate::build::{
    build_column_index, build_column_indexes, build_derived_bitmap, BuildStats, IndexError,
};
pub use crate::eval::{and_all, equals, not, or_all, range, semi_join};
pub use crate::index::{ColumnIndex, IndexEntry};
pub use crate::key::IndexKey;
pub use crate::materialize::{materialize, scan};
