// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark output parser.
//!
//! Turns one raw text file into a [`MetricRecord`]. The file shape is
//! detected in a fixed order:
//!
//! 1. captured `STDOUT:`/`STDERR:` dumps are narrowed to their stdout part;
//! 2. `mpstat` output becomes a time series;
//! 3. the benchmark kind picks a [`ParseStrategy`].
//!
//! Parsing never returns an error. Unreadable or shapeless input yields
//! [`ParseOutcome::Unparsable`] with an empty record.

pub mod cpu;
pub mod generic;
pub mod mpstat;

use benchviz_core::{BenchmarkKind, MetricRecord, ParseOutcome, RawFile, SystemInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use cpu::CpuUtilizationParser;
pub use generic::GenericParser;

/// Header preceding the captured standard output in raw output files.
pub const STDOUT_HEADER: &str = "STDOUT:";
/// Header preceding the captured standard error in raw output files.
pub const STDERR_HEADER: &str = "STDERR:";
/// File-name suffix of the raw output companion file.
pub const RAW_OUTPUT_SUFFIX: &str = "__raw_output.txt";
/// File-name suffix of the per-instance system description written by a run.
pub const SYSTEM_INFO_SUFFIX: &str = "__system_info.txt";
/// Separator between the instance name and the original file name.
pub const INSTANCE_SEPARATOR: &str = "__";

static ARCHITECTURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)Architecture:[ \t]*(.*)$").expect("valid architecture regex"));
static MODEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)Model name:[ \t]*(.*)$").expect("valid model regex"));
static CPU_CORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CPU Cores:\s*(\d+)").expect("valid cores regex"));

/// Everything a strategy needs to parse one file.
#[derive(Debug, Clone, Copy)]
pub struct ParseInput<'a> {
    /// File name (not the full path), used for shape detection.
    pub file_name: &'a str,
    /// Text to parse.
    pub content: &'a str,
    pub kind: &'a BenchmarkKind,
    /// Raw output captured next to the file, if any. Source of stress-tool
    /// summary lines.
    pub companion: Option<&'a str>,
}

impl<'a> ParseInput<'a> {
    pub fn new(file_name: &'a str, content: &'a str, kind: &'a BenchmarkKind) -> Self {
        Self {
            file_name,
            content,
            kind,
            companion: None,
        }
    }

    pub fn with_companion(mut self, companion: Option<&'a str>) -> Self {
        self.companion = companion;
        self
    }
}

/// A per-kind parse strategy.
pub trait ParseStrategy: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Parse `input` into `record`, which arrives with the raw content and
    /// benchmark type already set.
    fn parse(&self, input: &ParseInput<'_>, record: MetricRecord) -> ParseOutcome;
}

static CPU_STRATEGY: CpuUtilizationParser = CpuUtilizationParser;
static GENERIC_STRATEGY: GenericParser = GenericParser;

/// Strategy bound to a benchmark kind.
pub fn strategy_for(kind: &BenchmarkKind) -> &'static dyn ParseStrategy {
    match kind {
        BenchmarkKind::CpuUtilization => &CPU_STRATEGY,
        BenchmarkKind::Generic(_) => &GENERIC_STRATEGY,
    }
}

/// Parse in-memory content.
pub fn parse_content(input: &ParseInput<'_>) -> ParseOutcome {
    let record =
        MetricRecord::new(input.kind.as_str()).with_raw_content(input.content.to_string());

    let narrowed;
    let input = match stdout_segment(input.content) {
        Some(segment) => {
            narrowed = ParseInput {
                content: segment,
                companion: input.companion.or(Some(input.content)),
                ..*input
            };
            &narrowed
        }
        None => input,
    };

    if mpstat::looks_like_mpstat(input.file_name, input.content) {
        return mpstat::parse(input, record);
    }

    let strategy = strategy_for(input.kind);
    debug!(file = input.file_name, strategy = strategy.name(), "parsing benchmark output");
    strategy.parse(input, record)
}

/// Read and parse a file. The benchmark kind is usually derived from the
/// enclosing directory name.
pub fn parse_file(path: &Path, kind: &BenchmarkKind) -> ParseOutcome {
    let raw = match RawFile::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read benchmark output");
            return ParseOutcome::unparsable(kind.as_str(), format!("unreadable: {}", e));
        }
    };
    let file_name = raw.file_name();
    let content = raw.content;

    let companion = match kind {
        BenchmarkKind::CpuUtilization => read_companion(path),
        BenchmarkKind::Generic(_) => None,
    };

    let input = ParseInput::new(&file_name, &content, kind).with_companion(companion.as_deref());
    let outcome = parse_content(&input);
    debug!(path = %path.display(), outcome = outcome.label(), "parsed benchmark output");
    outcome
}

/// Instance name encoded as the file-name prefix before `__`.
pub fn instance_name_of(file_name: &str) -> Option<&str> {
    file_name
        .split_once(INSTANCE_SEPARATOR)
        .map(|(instance, _)| instance)
        .filter(|instance| !instance.is_empty())
}

/// Path of the raw output file captured alongside `path`, if `path`
/// follows the `<instance>__<file>` naming convention.
pub fn companion_path(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_str()?;
    let instance = instance_name_of(file_name)?;
    let candidate = path.with_file_name(format!("{}{}", instance, RAW_OUTPUT_SUFFIX));
    (candidate != path).then_some(candidate)
}

fn read_companion(path: &Path) -> Option<String> {
    let companion = companion_path(path)?;
    match fs::read(&companion) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %companion.display(), error = %e, "failed to read raw output companion");
            None
        }
    }
}

/// Stdout part of a captured-streams dump, when the dump also carries
/// stress-tool output.
fn stdout_segment(content: &str) -> Option<&str> {
    let start = content.find(STDOUT_HEADER)?;
    if !(content.contains("stress-ng") || content.contains(cpu::RUN_HEADER_PREFIX)) {
        return None;
    }
    let body = &content[start + STDOUT_HEADER.len()..];
    let end = body.find(STDERR_HEADER).unwrap_or(body.len());
    Some(&body[..end])
}

/// Labelled `Architecture:`, `Model name:` and `CPU Cores:` lines.
pub(crate) fn extract_system_info(content: &str) -> SystemInfo {
    let labelled = |re: &Regex| {
        re.captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    SystemInfo {
        architecture: labelled(&*ARCHITECTURE),
        cpu_model: labelled(&*MODEL_NAME),
        cpu_cores: CPU_CORES
            .captures(content)
            .and_then(|c| c[1].parse().ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_DUMP: &str = "STDOUT:\n\
=== CPU Utilization Results (Run: heavy) ===\n\
Average CPU utilization (all cores): 96.4%\n\
Load: 4 cores\n\
Duration: 30 seconds\n\
\n\
STDERR:\n\
Average CPU utilization (all cores): 1.0%\n";

    #[test]
    fn test_stdout_segment_requires_stress_marker() {
        assert!(stdout_segment("STDOUT:\nhello\nSTDERR:\n").is_none());
        let segment = stdout_segment(RAW_DUMP).unwrap();
        assert!(segment.contains("Run: heavy"));
        assert!(!segment.contains("1.0%"));
    }

    #[test]
    fn test_raw_dump_parses_stdout_only() {
        let kind = BenchmarkKind::CpuUtilization;
        let input = ParseInput::new("box__raw_output.txt", RAW_DUMP, &kind);
        let record = parse_content(&input).into_record();

        assert_eq!(record.metrics.average_utilization, Some(vec![96.4]));
        assert_eq!(record.raw_content, RAW_DUMP);
    }

    #[test]
    fn test_mpstat_takes_precedence_over_kind() {
        let kind = BenchmarkKind::CpuUtilization;
        let content = "=== CPU Utilization Results (Run: light) ===\n\
Average CPU utilization (all cores): 20.0%\n\
12:00:01     all   10.00    0.00    5.00    1.00    0.00    0.00    0.00    0.00    0.00   84.00\n";
        let input = ParseInput::new("box__mpstat_light.txt", content, &kind);
        let record = parse_content(&input).into_record();

        assert!(record.metrics.runs.is_none());
        assert_eq!(record.metrics.time_series.unwrap()[0].utilization, 16.0);
    }

    #[test]
    fn test_instance_name_of() {
        assert_eq!(instance_name_of("graviton4__metadata_full.txt"), Some("graviton4"));
        assert_eq!(instance_name_of("plain.txt"), None);
        assert_eq!(instance_name_of("__orphan.txt"), None);
    }

    #[test]
    fn test_companion_path() {
        let path = Path::new("/r/box/100_cpu_utilization/box__cpu_benchmark_results.txt");
        assert_eq!(
            companion_path(path).unwrap(),
            Path::new("/r/box/100_cpu_utilization/box__raw_output.txt")
        );
        assert!(companion_path(Path::new("/r/box/x/box__raw_output.txt")).is_none());
    }

    #[test]
    fn test_extract_system_info() {
        let info = extract_system_info(
            "Architecture:        aarch64\nModel name:          Neoverse-V2  \nCPU Cores: 16\n",
        );
        assert_eq!(info.architecture.as_deref(), Some("aarch64"));
        assert_eq!(info.cpu_model.as_deref(), Some("Neoverse-V2"));
        assert_eq!(info.cpu_cores, Some(16));
    }

    #[test]
    fn test_parse_missing_file_is_unparsable() {
        let outcome = parse_file(
            Path::new("/definitely/not/here/box__results.txt"),
            &BenchmarkKind::CpuUtilization,
        );
        assert!(!outcome.is_usable());
        assert!(outcome.record().metrics.is_empty());
    }
}
