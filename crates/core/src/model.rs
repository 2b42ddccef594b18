// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Normalized metric model.
//!
//! Every parsed benchmark file, whatever its original shape, is turned into
//! a [`MetricRecord`]. Records for the same (instance, benchmark) pair are
//! folded together with [`MetricRecord::merge`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Utilization reported when a CPU benchmark file carries no usable figure.
pub const DEFAULT_UTILIZATION: f64 = 99.0;

/// Clamp a percentage into `[0, 100]`. NaN maps to 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One raw benchmark output file, read once and discarded after parsing.
#[derive(Debug, Clone)]
pub struct RawFile {
    /// Location of the file on disk.
    pub path: PathBuf,
    /// Benchmark type tag, taken from the enclosing directory name.
    pub benchmark_type: String,
    /// Full text content.
    pub content: String,
}

impl RawFile {
    /// Read `path`, tagging it with the name of its parent directory.
    /// Invalid UTF-8 is replaced.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let benchmark_type = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            benchmark_type,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Final path component, empty when there is none.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Host description attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// CPU architecture, e.g. `ARM64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// CPU model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    /// Online core count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
}

impl SystemInfo {
    /// Overwrite every field that `other` sets (last writer wins per field).
    pub fn update(&mut self, other: &SystemInfo) {
        if let Some(arch) = &other.architecture {
            self.architecture = Some(arch.clone());
        }
        if let Some(model) = &other.cpu_model {
            self.cpu_model = Some(model.clone());
        }
        if let Some(cores) = other.cpu_cores {
            self.cpu_cores = Some(cores);
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.architecture.is_none() && self.cpu_model.is_none() && self.cpu_cores.is_none()
    }
}

/// Machine-readable summary emitted by the stress tool for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressMetrics {
    pub bogo_ops: u64,
    pub real_time: f64,
    pub usr_time: f64,
    pub sys_time: f64,
    pub bogo_ops_real: f64,
    pub bogo_ops_time: f64,
}

/// One execution of a benchmark under a given load/duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Average utilization over all cores, always within `[0, 100]`.
    pub avg_utilization: f64,
    /// Requested load, usually a core count. `"unknown"` when absent.
    pub load: String,
    /// Requested duration in seconds. `"unknown"` when absent.
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_metrics: Option<StressMetrics>,
}

impl RunRecord {
    /// Create a run record, clamping the utilization into range.
    pub fn new(avg_utilization: f64, load: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            avg_utilization: clamp_percent(avg_utilization),
            load: load.into(),
            duration: duration.into(),
            stress_metrics: None,
        }
    }
}

/// One `mpstat` sample of the aggregate `all` CPU row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSample {
    /// Wall clock time of the sample, `HH:MM:SS`.
    pub time: String,
    /// `100 - %idle`.
    pub utilization: f64,
    pub usr: f64,
    pub sys: f64,
    pub iowait: f64,
}

/// Generic table extracted from pipe-delimited ASCII output.
pub type Table = Vec<Vec<String>>;

/// Scalar produced by the generic `key: value` extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Coerce a raw textual value: float if it contains `.`, else integer,
    /// else the trimmed text itself.
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('.') {
            if let Ok(v) = raw.parse::<f64>() {
                return MetricValue::Float(v);
            }
        } else if let Ok(v) = raw.parse::<i64>() {
            return MetricValue::Int(v);
        }
        MetricValue::Text(raw.to_string())
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

/// The metric payload of a record.
///
/// The recognized shapes are typed fields; everything the generic parser
/// finds lands in [`Metrics::values`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Flat per-run utilization list kept for single-run consumers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_utilization: Option<Vec<f64>>,
    /// Runs keyed by run name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<BTreeMap<String, RunRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_series: Option<Vec<TimeSample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<Table>>,
    /// Generic `key: value` metrics.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, MetricValue>,
}

impl Metrics {
    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.average_utilization.is_none()
            && self.runs.is_none()
            && self.time_series.is_none()
            && self.tables.is_none()
            && self.values.is_empty()
    }

    /// Fold `incoming` into `self`.
    ///
    /// Keys missing on `self` are copied over. `runs` accumulate by run
    /// name with the incoming run replacing a same-named one. Any other key
    /// already present keeps its existing value.
    pub fn merge(&mut self, incoming: Metrics) {
        if self.average_utilization.is_none() {
            self.average_utilization = incoming.average_utilization;
        }
        if let Some(runs) = incoming.runs {
            self.runs.get_or_insert_with(BTreeMap::new).extend(runs);
        }
        if self.time_series.is_none() {
            self.time_series = incoming.time_series;
        }
        if self.tables.is_none() {
            self.tables = incoming.tables;
        }
        for (key, value) in incoming.values {
            self.values.entry(key).or_insert(value);
        }
    }

    /// Run names in lexicographic order.
    pub fn run_names(&self) -> Vec<&str> {
        self.runs
            .as_ref()
            .map(|runs| runs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Look up a numeric generic metric.
    pub fn numeric(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(MetricValue::as_f64)
    }
}

/// Normalized result of parsing one file, or of merging several.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub benchmark_type: String,
    #[serde(default)]
    pub system_info: SystemInfo,
    #[serde(default)]
    pub metrics: Metrics,
    /// Original text, kept for diagnostics only.
    #[serde(skip)]
    pub raw_content: String,
}

impl MetricRecord {
    /// Empty record for the given benchmark type.
    pub fn new(benchmark_type: impl Into<String>) -> Self {
        Self {
            benchmark_type: benchmark_type.into(),
            ..Default::default()
        }
    }

    /// Attach the raw text the record was parsed from.
    pub fn with_raw_content(mut self, content: impl Into<String>) -> Self {
        self.raw_content = content.into();
        self
    }

    /// Merge another record for the same (instance, benchmark) pair.
    pub fn merge(&mut self, incoming: MetricRecord) {
        self.system_info.update(&incoming.system_info);
        self.metrics.merge(incoming.metrics);
        if self.raw_content.is_empty() {
            self.raw_content = incoming.raw_content;
        }
    }

    /// First entry of the flat utilization list.
    pub fn first_average_utilization(&self) -> Option<f64> {
        self.metrics
            .average_utilization
            .as_ref()
            .and_then(|values| values.first().copied())
    }
}
