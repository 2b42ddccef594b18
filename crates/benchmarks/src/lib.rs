// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark output processing for benchviz.
//!
//! Parses the text files a benchmark suite leaves behind, folds them into
//! per-instance records and renders the comparison report.
//!
//! # Quick Start
//!
//! ```no_run
//! use benchviz_benchmarks::{aggregate::scan_results_dir, report::render};
//! use std::path::Path;
//!
//! let report = scan_results_dir(Path::new("results/20250514_093005"));
//! let html = render(&report);
//! std::fs::write("report.html", html).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`parser`] - Raw text to `MetricRecord`, one strategy per benchmark kind
//! - [`aggregate`] - Merging records and scanning results directories
//! - [`report`] - Self-contained HTML report with Chart.js charts
//! - [`io`] - Results directory layout and report files

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod io;
pub mod parser;
pub mod report;

pub use aggregate::{aggregate_files, merge_metrics, scan_results_dir, FileRole};
pub use io::{reprocess, write_report, ResultsIoError};
pub use parser::{parse_content, parse_file, ParseInput, ParseStrategy};
pub use report::{render, render_with, ReportOptions};
