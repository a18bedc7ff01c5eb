#![forbid(unsafe_code)]

//! Benchmark orchestration over bitmap-indexed sources.
//!
//! A [`Scenario`] names the tables a query touches, the columns worth
//! indexing, and a predicate tree over those indexes. [`run_scenarios`]
//! drives each scenario through index build, pure bitmap evaluation, a
//! single-pass materialization of the surviving rows, and handoff to a
//! [`SqlEngine`], then folds the per-phase [`Measurement`]s into one
//! [`ResultRow`] per scenario for the append-only CSV [`ReportLog`].
//!
//! One scenario failing never stops the batch; its report row carries
//! the error instead of metrics.

mod engine;
mod metrics;
mod pipeline;
mod report;
mod scenario;

pub use engine::{EngineError, NamedTable, SqlEngine};
pub use metrics::{Instrument, Measurement, WallClock};
pub use pipeline::{run_scenarios, Catalog, PipelineError, ScenarioOutcome, Stage};
pub use report::{ReportError, ReportLog, ResultRow};
pub use scenario::{DerivedPredicate, PredicateExpr, Scenario, TableSpec};
