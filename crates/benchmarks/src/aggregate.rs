// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric aggregation.
//!
//! Folds the per-file parse outcomes for one (instance, benchmark) pair into
//! a single [`MetricRecord`], and builds an [`AggregatedReport`] from a
//! results directory laid out as `<root>/<instance>/<benchmark>/<instance>__<file>.txt`.

use crate::parser::{self, instance_name_of};
use benchviz_core::{AggregatedReport, BenchmarkKind, MetricRecord, Metrics, SystemInfo};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Fold `incoming` into `existing`.
///
/// Absent keys are copied, `runs` are unioned by run name with the incoming
/// run winning, and any other key already present is kept.
pub fn merge_metrics(existing: &mut Metrics, incoming: Metrics) {
    existing.merge(incoming);
}

/// What a file in a benchmark directory is, judged by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileRole {
    /// Run metadata (`metadata` / `manifest`).
    Metadata,
    /// Primary results (`result` / `output`).
    Result,
    /// Anything else, e.g. `mpstat` captures.
    Other,
    /// Captured stdout/stderr of the whole suite. Only used as a fallback.
    RawOutput,
}

impl FileRole {
    /// Classify a file name, case-insensitively.
    pub fn classify(file_name: &str) -> Self {
        let name = file_name.to_lowercase();
        if name.contains("__raw_output") {
            FileRole::RawOutput
        } else if name.contains("metadata") || name.contains("manifest") {
            FileRole::Metadata
        } else if name.contains("result") || name.contains("output") {
            FileRole::Result
        } else {
            FileRole::Other
        }
    }

    fn of(path: &Path) -> Self {
        path.file_name()
            .map(|n| Self::classify(&n.to_string_lossy()))
            .unwrap_or(FileRole::Other)
    }
}

/// Processing order: role first, then path.
fn processing_order(a: &PathBuf, b: &PathBuf) -> Ordering {
    FileRole::of(a).cmp(&FileRole::of(b)).then_with(|| a.cmp(b))
}

/// Parse and merge the files of one (instance, benchmark) pair.
///
/// Raw output files are only consulted when no other file yields a usable
/// outcome. Returns `None` when nothing usable was found.
pub fn aggregate_files(paths: &[PathBuf], kind: &BenchmarkKind) -> Option<MetricRecord> {
    let mut ordered: Vec<PathBuf> = paths.to_vec();
    ordered.sort_by(processing_order);

    let (raw, primary): (Vec<PathBuf>, Vec<PathBuf>) = ordered
        .into_iter()
        .partition(|p| FileRole::of(p) == FileRole::RawOutput);

    merge_usable(&primary, kind).or_else(|| {
        if !raw.is_empty() {
            debug!(benchmark = %kind, "falling back to raw output");
        }
        merge_usable(&raw, kind)
    })
}

/// Merge the usable outcomes of `paths`. System info found in files whose
/// metrics are unusable still fills fields the usable files left unset.
fn merge_usable(paths: &[PathBuf], kind: &BenchmarkKind) -> Option<MetricRecord> {
    let mut merged: Option<MetricRecord> = None;
    let mut stray_info = SystemInfo::default();
    for path in paths {
        let outcome = parser::parse_file(path, kind);
        if !outcome.is_usable() {
            debug!(path = %path.display(), "skipping file without usable metrics");
            stray_info.update(&outcome.record().system_info);
            continue;
        }
        let record = outcome.into_record();
        match merged.as_mut() {
            Some(existing) => existing.merge(record),
            None => merged = Some(record),
        }
    }
    merged.map(|mut record| {
        stray_info.update(&record.system_info);
        record.system_info = stray_info;
        record
    })
}

/// Build a report from a results directory.
///
/// Every instance directory shows up in the report. Every benchmark
/// directory holding at least one text file shows up too, with an empty
/// record when nothing in it parses. Text files directly inside an instance
/// directory describe the host and apply to all of its records.
pub fn scan_results_dir(dir: &Path) -> AggregatedReport {
    let mut report = AggregatedReport::new();
    register_layout(dir, &mut report);

    let mut groups: BTreeMap<(String, String), Vec<PathBuf>> = BTreeMap::new();
    let mut hosts: BTreeMap<String, SystemInfo> = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(2).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry in results directory");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_text_file(entry.path()) {
            continue;
        }
        if entry.depth() == 2 {
            if let Some(instance) = host_instance(dir, entry.path()) {
                hosts.entry(instance).or_default().update(&read_host_info(entry.path()));
            }
            continue;
        }
        let Some(key) = group_key(dir, entry.path()) else {
            continue;
        };
        groups.entry(key).or_default().push(entry.into_path());
    }

    let file_count: usize = groups.values().map(Vec::len).sum();
    for ((instance, benchmark), paths) in groups {
        let kind = BenchmarkKind::from_dir_name(&benchmark);
        match aggregate_files(&paths, &kind) {
            Some(record) => report.merge_record(instance, record),
            None => report.merge_record(instance, MetricRecord::new(benchmark)),
        }
    }

    for (instance, info) in &hosts {
        if let Some(records) = report.instances.get_mut(instance) {
            for record in records.values_mut() {
                record.system_info.update(info);
            }
        }
    }

    info!(
        dir = %dir.display(),
        instances = report.instances.len(),
        files = file_count,
        "scanned results directory"
    );
    report
}

/// `<root>/<instance>/<benchmark>/` directories, registered up front.
fn register_layout(dir: &Path, report: &mut AggregatedReport) {
    let instances = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read results directory");
            return;
        }
    };
    for instance_dir in instances.flatten().filter(|e| e.path().is_dir()) {
        let instance = instance_dir.file_name().to_string_lossy().into_owned();
        report.ensure_instance(instance.clone());

        let Ok(benchmarks) = fs::read_dir(instance_dir.path()) else {
            continue;
        };
        for benchmark_dir in benchmarks.flatten().filter(|e| e.path().is_dir()) {
            if !holds_text_file(&benchmark_dir.path()) {
                debug!(dir = %benchmark_dir.path().display(), "skipping benchmark directory without output");
                continue;
            }
            let benchmark = benchmark_dir.file_name().to_string_lossy().into_owned();
            report.merge_record(instance.clone(), MetricRecord::new(benchmark));
        }
    }
}

fn holds_text_file(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .flatten()
        .any(|e| e.file_type().is_file() && is_text_file(e.path()))
}

/// Instance directory of a file sitting directly below it.
fn host_instance(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    relative
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
}

fn read_host_info(path: &Path) -> SystemInfo {
    match fs::read_to_string(path) {
        Ok(content) => parser::extract_system_info(&content),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read host description");
            SystemInfo::default()
        }
    }
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

/// (instance, benchmark) for a file below `root`. The instance comes from
/// the file-name prefix, falling back to the top-level directory.
fn group_key(root: &Path, path: &Path) -> Option<(String, String)> {
    let relative = path.strip_prefix(root).ok()?;
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if components.len() < 3 {
        return None;
    }
    let file_name = components.last()?;
    let benchmark = components[components.len() - 2].clone();
    let instance = instance_name_of(file_name)
        .map(str::to_string)
        .unwrap_or_else(|| components[0].clone());
    Some((instance, benchmark))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_classify() {
        assert_eq!(FileRole::classify("box__raw_output.txt"), FileRole::RawOutput);
        assert_eq!(FileRole::classify("box__METADATA_full.txt"), FileRole::Metadata);
        assert_eq!(FileRole::classify("box__run_manifest.txt"), FileRole::Metadata);
        assert_eq!(FileRole::classify("box__cpu_benchmark_results.txt"), FileRole::Result);
        assert_eq!(FileRole::classify("box__mpstat_full_load.txt"), FileRole::Other);
    }

    #[test]
    fn test_role_ordering() {
        let mut paths = vec![
            PathBuf::from("d/box__raw_output.txt"),
            PathBuf::from("d/box__mpstat.txt"),
            PathBuf::from("d/box__results.txt"),
            PathBuf::from("d/box__metadata.txt"),
        ];
        paths.sort_by(processing_order);
        let names: Vec<_> = paths.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(
            names,
            vec![
                "box__metadata.txt",
                "box__results.txt",
                "box__mpstat.txt",
                "box__raw_output.txt"
            ]
        );
    }

    #[test]
    fn test_metadata_and_results_merge_runs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let paths = vec![
            write(
                dir,
                "box__metadata_light.txt",
                "run_name=light\nload=1\nduration=30\navg_utilization=24.0\n",
            ),
            write(
                dir,
                "box__cpu_benchmark_results.txt",
                "=== CPU Utilization Results (Run: heavy) ===\nLoad: 4 cores\nDuration: 30 seconds\nAverage CPU utilization (all cores): 98.0%\n",
            ),
        ];

        let record = aggregate_files(&paths, &BenchmarkKind::CpuUtilization).unwrap();
        assert_eq!(record.metrics.run_names(), vec!["heavy", "light"]);
        // metadata is processed first, so its flat list is kept
        assert_eq!(record.metrics.average_utilization, Some(vec![24.0]));
    }

    #[test]
    fn test_raw_output_is_fallback_only() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let raw = write(
            dir,
            "box__raw_output.txt",
            "STDOUT:\n=== CPU Utilization Results (Run: heavy) ===\nAverage CPU utilization (all cores): 91.0%\n\nSTDERR:\n",
        );
        let result = write(
            dir,
            "box__cpu_benchmark_results.txt",
            "Average CPU utilization (all cores): 50.0%\n",
        );

        let record =
            aggregate_files(&[raw.clone(), result], &BenchmarkKind::CpuUtilization).unwrap();
        assert!(record.metrics.runs.is_none());
        assert_eq!(record.first_average_utilization(), Some(50.0));

        let record = aggregate_files(&[raw], &BenchmarkKind::CpuUtilization).unwrap();
        assert_eq!(record.metrics.run_names(), vec!["heavy"]);
    }

    #[test]
    fn test_unusable_file_still_contributes_system_info() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let paths = vec![
            write(
                dir,
                "box__metadata_light.txt",
                "Architecture: aarch64\nModel name: Neoverse-V2\nrun_name=light\nload=1\n",
            ),
            write(
                dir,
                "box__cpu_benchmark_results.txt",
                "CPU Cores: 4\nAverage CPU utilization (all cores): 50.0%\n",
            ),
        ];

        let record = aggregate_files(&paths, &BenchmarkKind::CpuUtilization).unwrap();
        assert_eq!(record.first_average_utilization(), Some(50.0));
        assert_eq!(record.system_info.architecture.as_deref(), Some("aarch64"));
        assert_eq!(record.system_info.cpu_model.as_deref(), Some("Neoverse-V2"));
        assert_eq!(record.system_info.cpu_cores, Some(4));
    }

    #[test]
    fn test_nothing_usable() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "box__notes.txt", "no structure here\n");
        let kind = BenchmarkKind::from_dir_name("400_io_performance");
        assert!(aggregate_files(&[path], &kind).is_none());
    }

    #[test]
    fn test_scan_groups_by_instance_and_benchmark() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "arm/100_cpu_utilization/arm__cpu_benchmark_results.txt",
            "Average CPU utilization (all cores): 70.0%\n",
        );
        write(
            root,
            "x86/400_io_performance/x86__benchmark_results.txt",
            "Throughput: 812.5\n",
        );
        write(root, "x86/400_io_performance/x86__ignored.json", "{}");
        write(root, "x86/300_cache_performance/x86__notes.txt", "interrupted\n");
        fs::create_dir_all(root.join("idle/100_cpu_utilization")).unwrap();

        let report = scan_results_dir(root);

        assert_eq!(report.instance_names(), vec!["arm", "idle", "x86"]);
        assert_eq!(
            report.benchmark_types(),
            vec!["100_cpu_utilization", "300_cache_performance", "400_io_performance"]
        );
        let arm = report.get("arm", "100_cpu_utilization").unwrap();
        assert_eq!(arm.first_average_utilization(), Some(70.0));
        // a suite that never produced output gets no record
        assert!(report.get("idle", "100_cpu_utilization").is_none());
        assert!(report.get("x86", "300_cache_performance").is_some());
        assert_eq!(
            report.get("x86", "400_io_performance").unwrap().metrics.numeric("throughput"),
            Some(812.5)
        );
    }

    #[test]
    fn test_host_description_applies_to_every_record() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "arm/arm__system_info.txt",
            "Architecture: ARM64\nModel name: Neoverse-V2\nCPU Cores: 64\n",
        );
        write(
            root,
            "arm/100_cpu_utilization/arm__cpu_benchmark_results.txt",
            "Architecture: aarch64\nAverage CPU utilization (all cores): 70.0%\n",
        );
        write(root, "arm/400_io_performance/arm__benchmark_results.txt", "Throughput: 812.5\n");

        let report = scan_results_dir(root);

        assert_eq!(report.instance_names(), vec!["arm"]);
        assert_eq!(
            report.benchmark_types(),
            vec!["100_cpu_utilization", "400_io_performance"]
        );
        for benchmark in report.benchmark_types() {
            let info = &report.get("arm", &benchmark).unwrap().system_info;
            assert_eq!(info.architecture.as_deref(), Some("ARM64"));
            assert_eq!(info.cpu_model.as_deref(), Some("Neoverse-V2"));
            assert_eq!(info.cpu_cores, Some(64));
        }
    }

    #[test]
    fn test_group_key_falls_back_to_instance_dir() {
        let root = Path::new("/r");
        assert_eq!(
            group_key(root, Path::new("/r/arm/300_cache/stats.txt")),
            Some(("arm".to_string(), "300_cache".to_string()))
        );
        assert_eq!(group_key(root, Path::new("/r/arm/loose.txt")), None);
    }
}
