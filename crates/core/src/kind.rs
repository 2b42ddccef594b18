// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark kinds.
//!
//! Benchmarks are identified on disk by their directory name
//! (`100_cpu_utilization`, `300_cache_performance`, ...). Only the CPU
//! utilization benchmark has a dedicated parse and chart strategy; every
//! other directory is handled generically.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory name of the CPU utilization benchmark.
pub const CPU_UTILIZATION_DIR: &str = "100_cpu_utilization";

/// Closed set of benchmark kinds known to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BenchmarkKind {
    /// `100_cpu_utilization`: stress runs plus `mpstat` sampling.
    CpuUtilization,
    /// Any other benchmark directory, carried by name.
    Generic(String),
}

impl BenchmarkKind {
    /// Map a benchmark directory name to its kind.
    pub fn from_dir_name(name: &str) -> Self {
        if name == CPU_UTILIZATION_DIR {
            BenchmarkKind::CpuUtilization
        } else {
            BenchmarkKind::Generic(name.to_string())
        }
    }

    /// Directory name this kind is stored under.
    pub fn as_str(&self) -> &str {
        match self {
            BenchmarkKind::CpuUtilization => CPU_UTILIZATION_DIR,
            BenchmarkKind::Generic(name) => name,
        }
    }

    pub fn is_cpu_utilization(&self) -> bool {
        matches!(self, BenchmarkKind::CpuUtilization)
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for BenchmarkKind {
    fn from(name: &str) -> Self {
        Self::from_dir_name(name)
    }
}

impl From<String> for BenchmarkKind {
    fn from(name: String) -> Self {
        Self::from_dir_name(&name)
    }
}

impl From<BenchmarkKind> for String {
    fn from(kind: BenchmarkKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_name() {
        assert_eq!(
            BenchmarkKind::from_dir_name("100_cpu_utilization"),
            BenchmarkKind::CpuUtilization
        );
        assert_eq!(
            BenchmarkKind::from_dir_name("400_io_performance"),
            BenchmarkKind::Generic("400_io_performance".into())
        );
    }

    #[test]
    fn test_round_trips_through_string() {
        let kind: BenchmarkKind = "800_floating_point".into();
        assert_eq!(String::from(kind.clone()), "800_floating_point");
        assert_eq!(kind.to_string(), kind.as_str());

        let json = serde_json::to_string(&BenchmarkKind::CpuUtilization).unwrap();
        assert_eq!(json, "\"100_cpu_utilization\"");
    }
}
