// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! CPU utilization benchmark parser.
//!
//! Handles two mutually exclusive file shapes:
//!
//! - metadata files made of `key=value` lines describing a single run;
//! - result files holding one or more `=== CPU Utilization Results (Run: <name>) ===`
//!   sections.
//!
//! When neither yields a run, older flat formats are tried before falling
//! back to [`DEFAULT_UTILIZATION`].

use super::{extract_system_info, ParseInput, ParseStrategy};
use benchviz_core::{
    clamp_percent, MetricRecord, ParseOutcome, RunRecord, StressMetrics, DEFAULT_UTILIZATION,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Literal prefix of a run section header.
pub const RUN_HEADER_PREFIX: &str = "=== CPU Utilization Results (Run: ";

static RUN_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"=== CPU Utilization Results \(Run: (\w+)\) ===").expect("valid run header regex")
});
static AVERAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Average CPU utilization \(all cores\):\s*([\d.]+)%").expect("valid average regex")
});
static LOAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"Load: (\d+) cores").expect("valid load regex"));
static DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration: (\d+) seconds").expect("valid duration regex"));
static STRESS_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"stress-ng: metrc: \[\d+\]\s+cpu\s+(\d+)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)",
    )
    .expect("valid stress summary regex")
});
static IDLE_ALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"all\s+([\d.]+)").expect("valid idle regex"));

/// Terminators of a run section besides the next `===` marker.
const SECTION_TERMINATORS: [&str; 2] = ["===", "Creating metadata"];

/// Parse strategy for `100_cpu_utilization`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuUtilizationParser;

impl ParseStrategy for CpuUtilizationParser {
    fn name(&self) -> &'static str {
        "cpu_utilization"
    }

    fn parse(&self, input: &ParseInput<'_>, mut record: MetricRecord) -> ParseOutcome {
        record.system_info = extract_system_info(input.content);

        if input.content.contains("run_name=") {
            return parse_metadata(input.content, record);
        }

        let sections = run_sections(input.content);
        let mut runs: BTreeMap<String, RunRecord> = BTreeMap::new();
        let mut averages = Vec::new();

        for section in &sections {
            if let Some(run) = parse_run_section(section.body) {
                averages.push(run.avg_utilization);
                runs.insert(section.name.to_string(), run);
            }
        }

        if !runs.is_empty() {
            let names: Vec<&str> = sections.iter().map(|s| s.name).collect();
            let stress = stress_summaries(input.companion.unwrap_or(input.content));
            attribute_stress(&names, &stress, &mut runs);

            record.metrics.runs = Some(runs);
            record.metrics.average_utilization = Some(averages);
            return ParseOutcome::Parsed(record);
        }

        if let Some(values) = flat_averages(input.content) {
            record.metrics.average_utilization = Some(values);
            return ParseOutcome::Parsed(record);
        }

        if let Some(values) = idle_complements(input.content) {
            record.metrics.average_utilization = Some(values);
            return ParseOutcome::Parsed(record);
        }

        record.metrics.average_utilization = Some(vec![DEFAULT_UTILIZATION]);
        ParseOutcome::Partial {
            record,
            defaults: vec!["average_utilization"],
        }
    }
}

/// A `=== CPU Utilization Results (Run: <name>) ===` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSection<'a> {
    pub name: &'a str,
    /// Text after the header up to the next terminator.
    pub body: &'a str,
}

/// All run sections in file order.
pub fn run_sections(content: &str) -> Vec<RunSection<'_>> {
    RUN_HEADER
        .captures_iter(content)
        .filter_map(|caps| {
            let header = caps.get(0)?;
            let name = caps.get(1)?.as_str();
            let rest = &content[header.end()..];
            let end = SECTION_TERMINATORS
                .iter()
                .filter_map(|t| rest.find(t))
                .min()
                .unwrap_or(rest.len());
            Some(RunSection {
                name,
                body: &rest[..end],
            })
        })
        .collect()
}

/// Average, load and duration of one run section. Sections without an
/// average are not runs.
fn parse_run_section(body: &str) -> Option<RunRecord> {
    let avg = first_float(&AVERAGE, body)?;
    let load = first_capture(&LOAD, body).unwrap_or("unknown");
    let duration = first_capture(&DURATION, body).unwrap_or("unknown");
    Some(RunRecord::new(avg, load, duration))
}

fn parse_metadata(content: &str, mut record: MetricRecord) -> ParseOutcome {
    let mut run_name = None;
    let mut load = None;
    let mut duration = None;
    let mut avg_raw = None;

    for line in content.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("run_name=") {
            run_name = Some(v.trim());
        } else if let Some(v) = line.strip_prefix("load=") {
            load = Some(v.trim());
        } else if let Some(v) = line.strip_prefix("duration=") {
            duration = Some(v.trim());
        } else if let Some(v) = line.strip_prefix("avg_utilization=") {
            avg_raw = Some(v.trim());
        }
    }

    let Some(run_name) = run_name.filter(|n| !n.is_empty()) else {
        return ParseOutcome::Unparsable {
            record,
            reason: "metadata without run_name".to_string(),
        };
    };
    let Some(avg) = avg_raw.and_then(|v| v.parse::<f64>().ok()) else {
        return ParseOutcome::Unparsable {
            record,
            reason: format!("metadata for run {} without a numeric avg_utilization", run_name),
        };
    };

    let run = RunRecord::new(
        avg,
        load.unwrap_or("unknown"),
        duration.unwrap_or("unknown"),
    );
    record.metrics.average_utilization = Some(vec![run.avg_utilization]);
    record.metrics.runs = Some(BTreeMap::from([(run_name.to_string(), run)]));
    ParseOutcome::Parsed(record)
}

/// Stress-tool summary lines, in order of appearance.
pub fn stress_summaries(content: &str) -> Vec<StressMetrics> {
    STRESS_SUMMARY
        .captures_iter(content)
        .filter_map(|caps| {
            let float = |i: usize| caps[i].parse::<f64>().ok();
            Some(StressMetrics {
                bogo_ops: caps[1].parse().ok()?,
                real_time: float(2)?,
                usr_time: float(3)?,
                sys_time: float(4)?,
                bogo_ops_real: float(5)?,
                bogo_ops_time: float(6)?,
            })
        })
        .collect()
}

/// Pair the n-th run-name occurrence with the n-th stress summary. Nothing
/// is attributed unless both sequences have the same length.
pub fn attribute_stress(
    run_names: &[&str],
    stress: &[StressMetrics],
    runs: &mut BTreeMap<String, RunRecord>,
) {
    if stress.is_empty() {
        return;
    }
    if stress.len() != run_names.len() {
        debug!(
            runs = run_names.len(),
            summaries = stress.len(),
            "stress summary count does not match run count, skipping attribution"
        );
        return;
    }
    for (name, metrics) in run_names.iter().zip(stress) {
        if let Some(run) = runs.get_mut(*name) {
            run.stress_metrics = Some(*metrics);
        }
    }
}

fn flat_averages(content: &str) -> Option<Vec<f64>> {
    let values: Vec<f64> = AVERAGE
        .captures_iter(content)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .map(clamp_percent)
        .collect();
    (!values.is_empty()).then_some(values)
}

/// `all <idle>` occurrences, read as idle percentages.
fn idle_complements(content: &str) -> Option<Vec<f64>> {
    let values: Vec<f64> = IDLE_ALL
        .captures_iter(content)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .map(|idle| clamp_percent(100.0 - idle))
        .collect();
    (!values.is_empty()).then_some(values)
}

fn first_capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn first_float(re: &Regex, text: &str) -> Option<f64> {
    first_capture(re, text).and_then(|v| v.parse().ok())
}
