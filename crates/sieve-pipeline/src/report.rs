#![forbid(unsafe_code)]

//! Append-only CSV result log, one row per executed scenario.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// One report line. Optional metrics serialize as empty cells so runs on
/// platforms without samplers still produce well-formed files.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    #[serde(rename = "Query")]
    pub query: String,
    #[serde(rename = "Latency (s)")]
    pub latency_s: f64,
    #[serde(rename = "CPU Usage (%)")]
    pub cpu_percent: Option<f64>,
    #[serde(rename = "Peak Memory (MB)")]
    pub peak_memory_mb: Option<f64>,
    #[serde(rename = "Average Memory (MB)")]
    pub avg_memory_mb: Option<f64>,
    #[serde(rename = "IOPS")]
    pub iops: Option<f64>,
    #[serde(rename = "Index Size (MB)")]
    pub index_size_mb: f64,
    #[serde(rename = "Original Column Size (MB)")]
    pub original_column_size_mb: f64,
    #[serde(rename = "Index Build Time (s)")]
    pub index_build_time_s: f64,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to open report file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write report row: {0}")]
    Csv(#[from] csv::Error),
}

/// Appends rows to a CSV file, writing the header only when the file is
/// new or empty so repeated runs accumulate into one log.
#[derive(Clone, Debug)]
pub struct ReportLog {
    path: PathBuf,
}

impl ReportLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ReportLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, rows: &[ResultRow]) -> Result<(), ReportError> {
        if rows.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let fresh = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(query: &str, latency_s: f64) -> ResultRow {
        ResultRow {
            query: query.to_string(),
            latency_s,
            cpu_percent: Some(43.5),
            peak_memory_mb: Some(512.0),
            avg_memory_mb: None,
            iops: None,
            index_size_mb: 1.5,
            original_column_size_mb: 12.0,
            index_build_time_s: 0.25,
            error: None,
        }
    }

    #[test]
    fn header_written_once_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::new(dir.path().join("results.csv"));
        log.append(&[row("3", 1.5)]).unwrap();
        log.append(&[row("6", 0.5), row("12", 2.0)]).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "Query,Latency (s),CPU Usage (%),Peak Memory (MB),Average Memory (MB),\
             IOPS,Index Size (MB),Original Column Size (MB),Index Build Time (s),Error"
        );
        assert!(lines[1].starts_with("3,1.5,43.5,512.0,"));
        assert!(lines[3].starts_with("12,"));
    }

    #[test]
    fn missing_metrics_serialize_as_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::new(dir.path().join("results.csv"));
        let mut r = row("1", 1.0);
        r.cpu_percent = None;
        r.peak_memory_mb = None;
        log.append(&[r]).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let data = text.lines().nth(1).unwrap();
        assert_eq!(data, "1,1.0,,,,,1.5,12.0,0.25,");
    }

    #[test]
    fn failed_runs_carry_the_error_column() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::new(dir.path().join("results.csv"));
        let mut r = row("19", 0.0);
        r.error = Some("sql engine 'fake' failed: out of memory".to_string());
        log.append(&[r]).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("sql engine 'fake' failed: out of memory"));
    }

    #[test]
    fn empty_append_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::new(dir.path().join("results.csv"));
        log.append(&[]).unwrap();
        assert!(!log.path().exists());
    }
}
