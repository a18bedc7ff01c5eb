#![forbid(unsafe_code)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Logical column types understood by the batch sources.
///
/// `Date` cells are stored pre-normalized as days since the Unix epoch
/// (the same representation as Parquet `Date32`), so range comparisons
/// over dates are plain integer comparisons. The normalization is a
/// pure function of the raw value and never depends on batch size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    #[default]
    Float,
    Str,
    Bool,
    Date,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bool(bool),
    /// Days since 1970-01-01.
    Date(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Rough per-cell byte footprint of the raw column data.
    ///
    /// Used only for the "original column size" comparison in reports;
    /// nulls count one byte of presence information.
    pub fn byte_estimate(&self) -> usize {
        match self {
            Value::Null => 1,
            Value::Int(_) | Value::Float(_) | Value::Date(_) => 8,
            Value::Bool(_) => 1,
            Value::Str(s) => s.len(),
        }
    }

    pub fn str(s: &str) -> Value {
        Value::Str(Arc::<str>::from(s))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Parse a `YYYY-MM-DD` date into its day ordinal (days since the Unix
/// epoch). Returns `None` for unparseable input.
pub fn parse_date(s: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    // `NaiveDate::default()` is 1970-01-01.
    Some(date.signed_duration_since(NaiveDate::default()).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_matches_known_ordinals() {
        assert_eq!(parse_date("1970-01-01"), Some(0));
        assert_eq!(parse_date("1970-01-02"), Some(1));
        assert_eq!(parse_date("1969-12-31"), Some(-1));
        // TPC-H's favourite window edge.
        assert_eq!(parse_date("1994-01-01"), Some(8766));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn byte_estimates() {
        assert_eq!(Value::Int(7).byte_estimate(), 8);
        assert_eq!(Value::str("ASIA").byte_estimate(), 4);
        assert_eq!(Value::Null.byte_estimate(), 1);
    }
}
