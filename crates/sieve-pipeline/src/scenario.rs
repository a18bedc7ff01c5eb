#![forbid(unsafe_code)]

//! Declarative description of one benchmark query: which tables it reads,
//! which columns get indexed, and the predicate tree evaluated purely on
//! the indexes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sieve_columnar::{Batch, Value};

/// A named row-level predicate evaluated once per batch at build time and
/// stored as a plain bitmap, for conditions an equality/range lookup cannot
/// express (for example comparing two columns of the same row).
#[derive(Clone)]
pub struct DerivedPredicate {
    pub name: String,
    pub columns: Vec<String>,
    pub eval: Arc<dyn Fn(&Batch) -> Vec<bool> + Send + Sync>,
}

impl DerivedPredicate {
    pub fn new(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        eval: impl Fn(&Batch) -> Vec<bool> + Send + Sync + 'static,
    ) -> Self {
        DerivedPredicate {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            eval: Arc::new(eval),
        }
    }
}

impl fmt::Debug for DerivedPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedPredicate")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Predicate tree evaluated entirely against column indexes, without
/// touching row data. Plain data, so scenario definitions can live in
/// configuration files.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PredicateExpr {
    /// Rows whose indexed column equals the value exactly.
    Equals { column: String, value: Value },
    /// Rows whose indexed column falls in the half-open interval `[lo, hi)`.
    Range { column: String, lo: Value, hi: Value },
    /// A [`DerivedPredicate`] bitmap built for this table, by name.
    Derived { name: String },
    And(Vec<PredicateExpr>),
    Or(Vec<PredicateExpr>),
    Not(Box<PredicateExpr>),
    /// Rows of this table whose key appears among the rows of
    /// `target_table` selected by `target`. Both tables must index
    /// `key_column`.
    SemiJoin {
        key_column: String,
        target_table: String,
        target: Box<PredicateExpr>,
    },
}

impl PredicateExpr {
    pub fn equals(column: impl Into<String>, value: Value) -> Self {
        PredicateExpr::Equals {
            column: column.into(),
            value,
        }
    }

    pub fn range(column: impl Into<String>, lo: Value, hi: Value) -> Self {
        PredicateExpr::Range {
            column: column.into(),
            lo,
            hi,
        }
    }

    pub fn derived(name: impl Into<String>) -> Self {
        PredicateExpr::Derived { name: name.into() }
    }

    pub fn semi_join(
        key_column: impl Into<String>,
        target_table: impl Into<String>,
        target: PredicateExpr,
    ) -> Self {
        PredicateExpr::SemiJoin {
            key_column: key_column.into(),
            target_table: target_table.into(),
            target: Box::new(target),
        }
    }
}

/// How one table participates in a scenario.
#[derive(Clone, Debug)]
pub struct TableSpec {
    pub name: String,
    /// Columns to build a value index over during the build phase.
    pub indexed_columns: Vec<String>,
    /// Derived bitmaps to build alongside the column indexes.
    pub derived: Vec<DerivedPredicate>,
    /// Filter to evaluate over this table's indexes. `None` means the
    /// table is present only to be indexed (a semi-join target) or to be
    /// handed over whole.
    pub filter: Option<PredicateExpr>,
    /// Columns to materialize. `None` keeps the full schema.
    pub projection: Option<Vec<String>>,
    /// Hand the table to the engine unfiltered when it has no filter.
    pub pass_through: bool,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        TableSpec {
            name: name.into(),
            indexed_columns: Vec::new(),
            derived: Vec::new(),
            filter: None,
            projection: None,
            pass_through: false,
        }
    }

    pub fn index_column(mut self, column: impl Into<String>) -> Self {
        self.indexed_columns.push(column.into());
        self
    }

    pub fn derive(mut self, predicate: DerivedPredicate) -> Self {
        self.derived.push(predicate);
        self
    }

    pub fn filter(mut self, expr: PredicateExpr) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn project(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn pass_through(mut self) -> Self {
        self.pass_through = true;
        self
    }
}

/// One benchmark query: the tables to prepare and the SQL to run over
/// their filtered remainders.
#[derive(Clone, Debug)]
pub struct Scenario {
    /// Label written to the report, typically the query number.
    pub id: String,
    pub tables: Vec<TableSpec>,
    pub query: String,
}

impl Scenario {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Scenario {
            id: id.into(),
            tables: Vec::new(),
            query: query.into(),
        }
    }

    pub fn table(mut self, spec: TableSpec) -> Self {
        self.tables.push(spec);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_tables_and_columns() {
        let scenario = Scenario::new("6", "select sum(x) from t")
            .table(
                TableSpec::new("t")
                    .index_column("a")
                    .index_column("b")
                    .filter(PredicateExpr::equals("a", Value::Int(1)))
                    .project(["a", "x"]),
            )
            .table(TableSpec::new("u").pass_through());
        assert_eq!(scenario.tables.len(), 2);
        assert_eq!(scenario.tables[0].indexed_columns, ["a", "b"]);
        assert_eq!(
            scenario.tables[0].projection.as_deref(),
            Some(&["a".to_string(), "x".to_string()][..])
        );
        assert!(scenario.tables[1].pass_through);
        assert!(scenario.tables[1].filter.is_none());
    }

    #[test]
    fn derived_debug_omits_the_closure() {
        let d = DerivedPredicate::new("ship_before_commit", ["ship", "commit"], |_: &Batch| Vec::new());
        let repr = format!("{d:?}");
        assert!(repr.contains("ship_before_commit"));
        assert!(repr.ends_with(".. }"));
    }
}
