#![forbid(unsafe_code)]

//! Drives each scenario through build, evaluate, materialize, and handoff,
//! and turns the observed costs into report rows. A failing scenario is
//! recorded and skipped; the remaining scenarios still run.

use std::collections::BTreeMap;
use std::time::Duration;

use roaring::RoaringBitmap;
use thiserror::Error;
use tracing::{info, info_span, warn};

use sieve_columnar::{Batch, BatchSource, Table};
use sieve_index::{
    and_all, build_column_indexes, build_derived_bitmap, equals, materialize, not, or_all, range,
    scan, semi_join, ColumnIndex, IndexEntry, IndexError, IndexKey,
};

use crate::engine::{EngineError, NamedTable, SqlEngine};
use crate::metrics::{Instrument, Measurement};
use crate::report::ResultRow;
use crate::scenario::{PredicateExpr, Scenario};

/// Phase a scenario ended in: [`Stage::Done`] on success, otherwise the
/// phase whose error stopped the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    IndexBuild,
    PredicateEval,
    Materialize,
    Handoff,
    Done,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("table '{table}' has no index over column '{column}'")]
    MissingIndex { table: String, column: String },
    #[error("table '{table}' has no derived bitmap named '{name}'")]
    MissingDerived { table: String, name: String },
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// The sources scenarios draw their tables from, keyed by table name.
#[derive(Default)]
pub struct Catalog {
    sources: BTreeMap<String, Box<dyn BatchSource>>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    pub fn register(&mut self, name: impl Into<String>, source: Box<dyn BatchSource>) {
        self.sources.insert(name.into(), source);
    }

    fn get(&self, name: &str) -> Result<&dyn BatchSource, PipelineError> {
        self.sources
            .get(name)
            .map(|s| s.as_ref())
            .ok_or_else(|| PipelineError::UnknownTable(name.to_string()))
    }
}

/// What one scenario produced: the report row plus diagnostics tests and
/// callers can assert on directly. `stage` is [`Stage::Done`] exactly
/// when `row.error` is `None`.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub id: String,
    pub stage: Stage,
    pub row: ResultRow,
    /// Surviving row count per filtered table.
    pub filtered_rows: BTreeMap<String, u64>,
}

/// Everything built for one table during the index phase.
struct TableState {
    universe: u32,
    entries: BTreeMap<String, IndexEntry>,
}

impl TableState {
    fn column_index(&self, table: &str, column: &str) -> Result<&ColumnIndex, PipelineError> {
        self.entries
            .get(column)
            .and_then(IndexEntry::as_column)
            .ok_or_else(|| PipelineError::MissingIndex {
                table: table.to_string(),
                column: column.to_string(),
            })
    }
}

/// Runs every scenario against the catalog, executing each survivor set
/// on `engine`. Failures are isolated per scenario: the returned outcomes
/// always cover all scenarios, in order.
pub fn run_scenarios(
    catalog: &Catalog,
    scenarios: &[Scenario],
    engine: &mut dyn SqlEngine,
    instrument: &impl Instrument,
) -> Vec<ScenarioOutcome> {
    scenarios
        .iter()
        .map(|scenario| {
            let span = info_span!("scenario", query = %scenario.id, engine = engine.name());
            let _guard = span.enter();
            match run_scenario(catalog, scenario, engine, instrument) {
                Ok(outcome) => {
                    info!(latency_s = outcome.row.latency_s, "scenario finished");
                    outcome
                }
                Err((stage, err)) => {
                    warn!(?stage, error = %err, "scenario failed");
                    ScenarioOutcome {
                        id: scenario.id.clone(),
                        stage,
                        row: failed_row(&scenario.id, &err),
                        filtered_rows: BTreeMap::new(),
                    }
                }
            }
        })
        .collect()
}

fn failed_row(id: &str, err: &PipelineError) -> ResultRow {
    ResultRow {
        query: id.to_string(),
        latency_s: 0.0,
        cpu_percent: None,
        peak_memory_mb: None,
        avg_memory_mb: None,
        iops: None,
        index_size_mb: 0.0,
        original_column_size_mb: 0.0,
        index_build_time_s: 0.0,
        error: Some(err.to_string()),
    }
}

fn run_scenario(
    catalog: &Catalog,
    scenario: &Scenario,
    engine: &mut dyn SqlEngine,
    instrument: &impl Instrument,
) -> Result<ScenarioOutcome, (Stage, PipelineError)> {
    // INDEX_BUILD: one streaming pass per table over the columns the
    // scenario declares.
    let mut index_bytes = 0u64;
    let mut source_bytes = 0u64;
    let mut build_time = Duration::ZERO;
    let (built, build_measured) = instrument.measure(|| -> Result<_, PipelineError> {
        let mut states = BTreeMap::new();
        for spec in &scenario.tables {
            let source = catalog.get(&spec.name)?;
            let universe = u32::try_from(source.total_rows())
                .map_err(|_| IndexError::RowIdOverflow(source.total_rows()))?;
            let mut entries = BTreeMap::new();
            // A column read by both an index build and a derived pass
            // counts once in the raw size comparison.
            let mut column_bytes: BTreeMap<String, u64> = BTreeMap::new();
            if !spec.indexed_columns.is_empty() {
                let columns: Vec<&str> = spec.indexed_columns.iter().map(String::as_str).collect();
                let (indexes, stats) = build_column_indexes(source, &columns)?;
                for (column, index) in indexes {
                    index_bytes += index.serialized_size_bytes() as u64;
                    entries.insert(column, IndexEntry::Column(index));
                }
                build_time += stats.build_time;
                column_bytes.extend(stats.column_bytes);
            }
            for derived in &spec.derived {
                let columns: Vec<&str> = derived.columns.iter().map(String::as_str).collect();
                let (bitmap, stats) =
                    build_derived_bitmap(source, &columns, |batch: &Batch| (derived.eval)(batch))?;
                index_bytes += bitmap.serialized_size() as u64;
                build_time += stats.build_time;
                column_bytes.extend(stats.column_bytes);
                entries.insert(derived.name.clone(), IndexEntry::Bitmap(bitmap));
            }
            source_bytes += column_bytes.values().sum::<u64>();
            states.insert(spec.name.clone(), TableState { universe, entries });
        }
        Ok(states)
    });
    let states = built.map_err(|e| (Stage::IndexBuild, e))?;
    info!(
        index_mb = bytes_to_mb(index_bytes),
        source_mb = bytes_to_mb(source_bytes),
        "indexes built"
    );

    // PREDICATE_EVAL: pure bitmap algebra, no row data touched.
    let (evaluated, eval_measured) = instrument.measure(|| -> Result<_, PipelineError> {
        let mut filters = BTreeMap::new();
        for spec in &scenario.tables {
            if let Some(expr) = &spec.filter {
                filters.insert(spec.name.clone(), eval_expr(expr, &spec.name, &states)?);
            }
        }
        Ok(filters)
    });
    let filters = evaluated.map_err(|e| (Stage::PredicateEval, e))?;
    let filtered_rows: BTreeMap<String, u64> =
        filters.iter().map(|(t, b)| (t.clone(), b.len())).collect();

    // MATERIALIZE: one merge pass per filtered table, plus plain scans of
    // the pass-through tables.
    let (materialized, mat_measured) = instrument.measure(|| -> Result<_, PipelineError> {
        let mut tables = Vec::new();
        for spec in &scenario.tables {
            let projection: Option<Vec<&str>> = spec
                .projection
                .as_ref()
                .map(|cols| cols.iter().map(String::as_str).collect());
            let table = match filters.get(&spec.name) {
                Some(bitmap) => Some(materialize(
                    catalog.get(&spec.name)?,
                    bitmap,
                    projection.as_deref(),
                )?),
                None if spec.pass_through => {
                    Some(scan(catalog.get(&spec.name)?, projection.as_deref())?)
                }
                None => None,
            };
            if let Some(table) = table {
                tables.push(NamedTable {
                    name: spec.name.clone(),
                    table,
                });
            }
        }
        Ok(tables)
    });
    let tables = materialized.map_err(|e| (Stage::Materialize, e))?;
    for handed in &tables {
        info!(table = %handed.name, rows = table_rows(&handed.table), "table ready");
    }

    // HANDOFF: the engine reports its own execution cost.
    let engine_measured = engine
        .execute(&tables, &scenario.query)
        .map_err(|e| (Stage::Handoff, PipelineError::Engine(e)))?;

    let total = Measurement::merge_sequential(&[
        build_measured,
        eval_measured,
        mat_measured,
        engine_measured,
    ]);
    Ok(ScenarioOutcome {
        id: scenario.id.clone(),
        stage: Stage::Done,
        row: ResultRow {
            query: scenario.id.clone(),
            latency_s: total.latency.as_secs_f64(),
            cpu_percent: total.cpu_percent,
            peak_memory_mb: total.peak_memory_mb,
            avg_memory_mb: total.avg_memory_mb,
            iops: total.iops,
            index_size_mb: bytes_to_mb(index_bytes),
            original_column_size_mb: bytes_to_mb(source_bytes),
            index_build_time_s: build_time.as_secs_f64(),
            error: None,
        },
        filtered_rows,
    })
}

fn eval_expr(
    expr: &PredicateExpr,
    table: &str,
    states: &BTreeMap<String, TableState>,
) -> Result<RoaringBitmap, PipelineError> {
    let state = states
        .get(table)
        .ok_or_else(|| PipelineError::UnknownTable(table.to_string()))?;
    match expr {
        PredicateExpr::Equals { column, value } => {
            let index = state.column_index(table, column)?;
            Ok(match IndexKey::from_value(value) {
                Some(key) => equals(index, &key),
                None => RoaringBitmap::new(),
            })
        }
        PredicateExpr::Range { column, lo, hi } => {
            let index = state.column_index(table, column)?;
            Ok(
                match (IndexKey::from_value(lo), IndexKey::from_value(hi)) {
                    (Some(lo), Some(hi)) => range(index, &lo, &hi),
                    _ => RoaringBitmap::new(),
                },
            )
        }
        PredicateExpr::Derived { name } => state
            .entries
            .get(name)
            .and_then(IndexEntry::as_bitmap)
            .cloned()
            .ok_or_else(|| PipelineError::MissingDerived {
                table: table.to_string(),
                name: name.clone(),
            }),
        PredicateExpr::And(children) => {
            let operands = children
                .iter()
                .map(|c| eval_expr(c, table, states))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(and_all(&operands))
        }
        PredicateExpr::Or(children) => {
            let operands = children
                .iter()
                .map(|c| eval_expr(c, table, states))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(or_all(&operands))
        }
        PredicateExpr::Not(child) => Ok(not(&eval_expr(child, table, states)?, state.universe)),
        PredicateExpr::SemiJoin {
            key_column,
            target_table,
            target,
        } => {
            let survivors = eval_expr(target, target_table, states)?;
            let target_state = states
                .get(target_table)
                .ok_or_else(|| PipelineError::UnknownTable(target_table.to_string()))?;
            let target_index = target_state.column_index(target_table, key_column)?;
            let local_index = state.column_index(table, key_column)?;
            // Row ids of the two tables live in separate spaces, so the
            // surviving keys of the target are first mapped through this
            // table's own key index.
            let mut keys_here = RoaringBitmap::new();
            for (key, bucket) in target_index.iter() {
                if !bucket.is_disjoint(&survivors) {
                    keys_here |= equals(local_index, key);
                }
            }
            Ok(semi_join(local_index, &keys_here))
        }
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn table_rows(table: &Table) -> u64 {
    table.row_count() as u64
}
