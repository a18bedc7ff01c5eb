#![forbid(unsafe_code)]

use ordered_float::OrderedFloat;
use sieve_columnar::Value;
use std::sync::Arc;

/// Normalized, ordered key of a [`crate::ColumnIndex`] bucket.
///
/// Normalization is a pure function of the raw value: dates collapse to
/// their day ordinal so date ranges are integer ranges, and floats are
/// wrapped in [`OrderedFloat`] so they can key a `BTreeMap`. A given
/// column index only ever holds keys of one variant; the derived
/// cross-variant ordering exists solely to satisfy `BTreeMap`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
}

impl IndexKey {
    /// Nulls yield no key: a null row is absent from every bucket.
    pub fn from_value(value: &Value) -> Option<IndexKey> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Int(v) => Some(IndexKey::Int(*v)),
            Value::Date(days) => Some(IndexKey::Int(*days)),
            Value::Float(v) => Some(IndexKey::Float(OrderedFloat(*v))),
            Value::Str(s) => Some(IndexKey::Str(s.clone())),
        }
    }

    pub fn int(v: i64) -> IndexKey {
        IndexKey::Int(v)
    }

    pub fn float(v: f64) -> IndexKey {
        IndexKey::Float(OrderedFloat(v))
    }

    pub fn str(s: &str) -> IndexKey {
        IndexKey::Str(Arc::<str>::from(s))
    }
}
