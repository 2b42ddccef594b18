// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for benchviz.
//!
//! This crate holds the normalized metric model shared by the output
//! parser, the aggregator and the HTML renderer.
//!
//! # Modules
//!
//! - [`model`] - `MetricRecord` and the metric shapes it can carry
//! - [`kind`] - The closed set of benchmark kinds
//! - [`outcome`] - Parsed / partial / unparsable parse outcomes
//! - [`report`] - The aggregated per-instance report

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod kind;
pub mod model;
pub mod outcome;
pub mod report;

pub use kind::{BenchmarkKind, CPU_UTILIZATION_DIR};
pub use model::{
    clamp_percent, round2, MetricRecord, MetricValue, Metrics, RawFile, RunRecord, StressMetrics,
    SystemInfo, Table, TimeSample, DEFAULT_UTILIZATION,
};
pub use outcome::ParseOutcome;
pub use report::{AggregatedReport, RunFailure};
