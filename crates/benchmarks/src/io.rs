// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Results directory I/O.
//!
//! A run writes everything below one timestamped directory:
//!
//! ```text
//! results/<YYYYmmdd_HHMMSS>/
//!     report.html
//!     report.json
//!     <instance>/<instance>__system_info.txt
//!     <instance>/<benchmark>/<instance>__<file>
//! ```

use crate::aggregate::scan_results_dir;
use crate::parser::{
    INSTANCE_SEPARATOR, RAW_OUTPUT_SUFFIX, STDERR_HEADER, STDOUT_HEADER, SYSTEM_INFO_SUFFIX,
};
use crate::report::{render_with, ReportOptions};
use benchviz_core::{AggregatedReport, RunFailure, SystemInfo};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Rendered report file name.
pub const REPORT_HTML: &str = "report.html";
/// Serialized report file name.
pub const REPORT_JSON: &str = "report.json";
/// Format of run directory names.
pub const RUN_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Results I/O errors.
#[derive(Debug, Error)]
pub enum ResultsIoError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not a results directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// Result type for results I/O.
pub type Result<T> = std::result::Result<T, ResultsIoError>;

fn at(path: &Path) -> impl FnOnce(std::io::Error) -> ResultsIoError + '_ {
    move |source| ResultsIoError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Create `<results_root>/<YYYYmmdd_HHMMSS>` for a run started at `started`.
pub fn create_run_dir(results_root: &Path, started: DateTime<Utc>) -> Result<PathBuf> {
    let dir = results_root.join(started.format(RUN_DIR_FORMAT).to_string());
    fs::create_dir_all(&dir).map_err(at(&dir))?;
    Ok(dir)
}

/// Create and return `<run_dir>/<instance>`.
pub fn instance_dir(run_dir: &Path, instance: &str) -> Result<PathBuf> {
    let dir = run_dir.join(instance);
    fs::create_dir_all(&dir).map_err(at(&dir))?;
    Ok(dir)
}

/// Create and return `<run_dir>/<instance>/<benchmark>`.
pub fn benchmark_dir(run_dir: &Path, instance: &str, benchmark: &str) -> Result<PathBuf> {
    let dir = run_dir.join(instance).join(benchmark);
    fs::create_dir_all(&dir).map_err(at(&dir))?;
    Ok(dir)
}

/// Write `info` as `<run_dir>/<instance>/<instance>__system_info.txt`, one
/// labelled line per known field, in the format the parsers read back.
pub fn write_system_info(run_dir: &Path, instance: &str, info: &SystemInfo) -> Result<PathBuf> {
    let path = instance_dir(run_dir, instance)?
        .join(format!("{}{}", instance, SYSTEM_INFO_SUFFIX));
    let mut content = String::new();
    if let Some(arch) = &info.architecture {
        content.push_str(&format!("Architecture: {}\n", arch));
    }
    if let Some(model) = &info.cpu_model {
        content.push_str(&format!("Model name: {}\n", model));
    }
    if let Some(cores) = info.cpu_cores {
        content.push_str(&format!("CPU Cores: {}\n", cores));
    }
    fs::write(&path, content).map_err(at(&path))?;
    Ok(path)
}

/// `<instance>__<base name of file_name>`.
pub fn instance_file_name(instance: &str, file_name: &str) -> String {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    format!("{}{}{}", instance, INSTANCE_SEPARATOR, base)
}

/// Write the captured streams of a suite run as `<instance>__raw_output.txt`.
pub fn write_raw_output(dir: &Path, instance: &str, stdout: &str, stderr: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{}{}", instance, RAW_OUTPUT_SUFFIX));
    let content = format!(
        "{}\n{}\n\n{}\n{}",
        STDOUT_HEADER, stdout, STDERR_HEADER, stderr
    );
    fs::write(&path, content).map_err(at(&path))?;
    Ok(path)
}

/// Store a file fetched from an instance under its prefixed name.
pub fn write_fetched(dir: &Path, instance: &str, remote_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(instance_file_name(instance, remote_name));
    fs::write(&path, bytes).map_err(at(&path))?;
    Ok(path)
}

/// Write `report.html` and `report.json` into `run_dir`. Returns the HTML path.
pub fn write_report(
    run_dir: &Path,
    report: &AggregatedReport,
    options: &ReportOptions,
) -> Result<PathBuf> {
    fs::create_dir_all(run_dir).map_err(at(run_dir))?;

    let html_path = run_dir.join(REPORT_HTML);
    fs::write(&html_path, render_with(report, options)).map_err(at(&html_path))?;

    let json_path = run_dir.join(REPORT_JSON);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&json_path, json).map_err(at(&json_path))?;

    info!(path = %html_path.display(), "report written");
    Ok(html_path)
}

/// Read a report previously written by [`write_report`].
pub fn read_report_json(path: &Path) -> Result<AggregatedReport> {
    let content = fs::read_to_string(path).map_err(at(path))?;
    Ok(serde_json::from_str(&content)?)
}

/// Rebuild the report of an existing run directory without running
/// anything. Returns the HTML path.
pub fn reprocess(run_dir: &Path) -> Result<PathBuf> {
    reprocess_with(run_dir, &ReportOptions::now())
}

/// [`reprocess`] with explicit rendering options.
pub fn reprocess_with(run_dir: &Path, options: &ReportOptions) -> Result<PathBuf> {
    if !run_dir.is_dir() {
        return Err(ResultsIoError::NotADirectory(run_dir.to_path_buf()));
    }
    let mut report = scan_results_dir(run_dir);
    report.failures = stored_failures(run_dir);
    write_report(run_dir, &report, options)
}

/// Failures kept in an earlier `report.json`. They cannot be rebuilt from
/// the downloaded files.
fn stored_failures(run_dir: &Path) -> Vec<RunFailure> {
    let path = run_dir.join(REPORT_JSON);
    if !path.is_file() {
        return Vec::new();
    }
    match read_report_json(&path) {
        Ok(report) => {
            debug!(count = report.failures.len(), "keeping recorded failures");
            report.failures
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable report.json");
            Vec::new()
        }
    }
}
