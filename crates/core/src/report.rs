// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Aggregated report model.
//!
//! The report maps instance name → benchmark type → merged record. Maps are
//! ordered so that rendering is reproducible.

use crate::model::MetricRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A benchmark that could not be executed or collected on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub instance: String,
    pub benchmark: String,
    pub message: String,
}

/// Per-instance, per-benchmark merged records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    /// Records keyed by instance name, then benchmark type.
    pub instances: BTreeMap<String, BTreeMap<String, MetricRecord>>,
    /// Failures recorded while producing the report.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RunFailure>,
}

impl AggregatedReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance so it shows up even without any record.
    pub fn ensure_instance(&mut self, instance: impl Into<String>) {
        self.instances.entry(instance.into()).or_default();
    }

    /// Insert a record, replacing whatever was stored for the pair.
    pub fn insert(&mut self, instance: impl Into<String>, record: MetricRecord) {
        let benchmark = record.benchmark_type.clone();
        self.instances
            .entry(instance.into())
            .or_default()
            .insert(benchmark, record);
    }

    /// Merge a record into the one stored for the pair, creating it if needed.
    pub fn merge_record(&mut self, instance: impl Into<String>, record: MetricRecord) {
        let benchmarks = self.instances.entry(instance.into()).or_default();
        match benchmarks.get_mut(&record.benchmark_type) {
            Some(existing) => existing.merge(record),
            None => {
                benchmarks.insert(record.benchmark_type.clone(), record);
            }
        }
    }

    /// Record a failure for an (instance, benchmark) pair. The instance
    /// stays listed in the report.
    pub fn record_failure(
        &mut self,
        instance: impl Into<String>,
        benchmark: impl Into<String>,
        message: impl Into<String>,
    ) {
        let instance = instance.into();
        self.ensure_instance(instance.clone());
        self.failures.push(RunFailure {
            instance,
            benchmark: benchmark.into(),
            message: message.into(),
        });
    }

    /// Distinct benchmark types across all instances, sorted.
    pub fn benchmark_types(&self) -> Vec<String> {
        let types: BTreeSet<&String> = self.instances.values().flat_map(|b| b.keys()).collect();
        types.into_iter().cloned().collect()
    }

    pub fn instance_names(&self) -> Vec<&str> {
        self.instances.keys().map(String::as_str).collect()
    }

    pub fn get(&self, instance: &str, benchmark: &str) -> Option<&MetricRecord> {
        self.instances.get(instance).and_then(|b| b.get(benchmark))
    }

    /// Every instance paired with its record for `benchmark`, if any.
    pub fn section(&self, benchmark: &str) -> Vec<(&str, Option<&MetricRecord>)> {
        self.instances
            .iter()
            .map(|(name, benchmarks)| (name.as_str(), benchmarks.get(benchmark)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunRecord;

    fn cpu_record(run: &str, util: f64) -> MetricRecord {
        let mut record = MetricRecord::new("100_cpu_utilization");
        record.metrics.runs = Some(BTreeMap::from([(run.to_string(), RunRecord::new(util, "2", "60"))]));
        record
    }

    #[test]
    fn test_merge_record_accumulates_runs() {
        let mut report = AggregatedReport::new();
        report.merge_record("graviton", cpu_record("light", 25.0));
        report.merge_record("graviton", cpu_record("heavy", 97.0));

        let record = report.get("graviton", "100_cpu_utilization").unwrap();
        assert_eq!(record.metrics.run_names(), vec!["heavy", "light"]);
    }

    #[test]
    fn test_benchmark_types_are_sorted_and_distinct() {
        let mut report = AggregatedReport::new();
        report.insert("b", MetricRecord::new("400_io_performance"));
        report.insert("a", MetricRecord::new("100_cpu_utilization"));
        report.insert("a", MetricRecord::new("400_io_performance"));

        assert_eq!(
            report.benchmark_types(),
            vec!["100_cpu_utilization", "400_io_performance"]
        );
    }

    #[test]
    fn test_section_lists_every_instance() {
        let mut report = AggregatedReport::new();
        report.insert("a", MetricRecord::new("100_cpu_utilization"));
        report.ensure_instance("b");

        let section = report.section("100_cpu_utilization");
        assert_eq!(section.len(), 2);
        assert!(section[0].1.is_some());
        assert_eq!(section[1], ("b", None));
    }

    #[test]
    fn test_record_failure_keeps_instance() {
        let mut report = AggregatedReport::new();
        report.record_failure("x86-box", "100_cpu_utilization", "ssh: connection refused");

        assert_eq!(report.instance_names(), vec!["x86-box"]);
        assert_eq!(report.failures.len(), 1);
    }
}
