// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Charts for the CPU utilization benchmark.

use super::chart::{Axis, ChartKind, ChartSpec, Color, Dataset, PRIMARY, TEAL};
use super::{title_case, ChartStrategy, Section};
use benchviz_core::{MetricRecord, TimeSample};
use std::collections::BTreeSet;

/// Per-run bars, a run comparison and `mpstat` time series.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuCharts;

impl ChartStrategy for CpuCharts {
    fn charts(&self, section: &Section<'_>) -> Vec<ChartSpec> {
        let mut charts = Vec::new();
        let labels = section.instance_labels();
        let run_names = run_names(section);

        if run_names.is_empty() {
            let values = section
                .entries
                .iter()
                .map(|(_, record)| {
                    record
                        .and_then(MetricRecord::first_average_utilization)
                        .unwrap_or(0.0)
                })
                .collect();
            charts.push(ChartSpec::bar(
                "Average CPU Utilization",
                labels.clone(),
                vec![Dataset::bars("Average CPU Utilization (%)", values, PRIMARY)],
                Axis::percent(),
                "%",
            ));
        } else {
            for run in &run_names {
                let pretty = title_case(run);
                charts.push(ChartSpec::bar(
                    format!("CPU Utilization - {}", pretty),
                    labels.clone(),
                    vec![Dataset::bars(
                        format!("{} - CPU Utilization (%)", pretty),
                        run_values(section, run),
                        PRIMARY,
                    )],
                    Axis::percent(),
                    "%",
                ));
            }
        }

        if run_names.len() > 1 {
            let datasets = run_names
                .iter()
                .enumerate()
                .map(|(i, run)| Dataset::bars(title_case(run), run_values(section, run), Color::nth(i)))
                .collect();
            charts.push(ChartSpec::bar(
                "CPU Utilization Comparison",
                labels,
                datasets,
                Axis::percent(),
                "%",
            ));
        }

        charts.extend(time_series_charts(section));
        charts
    }
}

/// Union of run names across the section, sorted.
fn run_names<'a>(section: &Section<'a>) -> Vec<&'a str> {
    let names: BTreeSet<&str> = section
        .entries
        .iter()
        .filter_map(|(_, record)| *record)
        .flat_map(|record| record.metrics.run_names())
        .collect();
    names.into_iter().collect()
}

/// `avg_utilization` of `run` per instance, 0 when the instance lacks it.
fn run_values(section: &Section<'_>, run: &str) -> Vec<f64> {
    section
        .entries
        .iter()
        .map(|(_, record)| {
            record
                .and_then(|r| r.metrics.runs.as_ref())
                .and_then(|runs| runs.get(run))
                .map(|r| r.avg_utilization)
                .unwrap_or(0.0)
        })
        .collect()
}

fn series_of<'a>(record: Option<&'a MetricRecord>) -> Option<&'a [TimeSample]> {
    record
        .and_then(|r| r.metrics.time_series.as_deref())
        .filter(|series| !series.is_empty())
}

fn points(series: &[TimeSample], value: impl Fn(&TimeSample) -> f64) -> Vec<(String, f64)> {
    series.iter().map(|s| (s.time.clone(), value(s))).collect()
}

fn time_series_charts(section: &Section<'_>) -> Vec<ChartSpec> {
    let with_series: Vec<(usize, &str, &[TimeSample])> = section
        .entries
        .iter()
        .enumerate()
        .filter_map(|(i, (name, record))| series_of(*record).map(|s| (i, *name, s)))
        .collect();
    if with_series.is_empty() {
        return Vec::new();
    }

    let overlay = with_series
        .iter()
        .map(|(i, name, series)| {
            Dataset::line(*name, points(series, |s| s.utilization), Color::nth(*i))
        })
        .collect();

    let mut charts = vec![ChartSpec::time_lines(
        "CPU Utilization Over Time",
        overlay,
        Axis::percent().titled("CPU Utilization (%)"),
    )];

    for (_, name, series) in &with_series {
        charts.push(breakdown_chart(name, series));
    }
    charts
}

/// usr/sys/iowait stacked per sample, with the total drawn on top.
fn breakdown_chart(instance: &str, series: &[TimeSample]) -> ChartSpec {
    let stacked = [
        ("User", Color::rgb(255, 99, 132), points(series, |s| s.usr)),
        ("System", Color::rgb(54, 162, 235), points(series, |s| s.sys)),
        ("I/O Wait", Color::rgb(255, 206, 86), points(series, |s| s.iowait)),
    ];

    let mut datasets: Vec<Dataset> = stacked
        .into_iter()
        .map(|(label, color, pts)| {
            let mut ds = Dataset::line(label, pts, color);
            ds.kind = None;
            ds.background_color = color.rgba(0.7);
            ds.border_width = 1;
            ds.fill = None;
            ds.tension = None;
            ds
        })
        .collect();

    let mut total = Dataset::line("Total CPU", points(series, |s| s.utilization), TEAL);
    total.kind = Some(ChartKind::Line);
    total.background_color = "transparent".to_string();
    total.order = Some(0);
    datasets.push(total);

    ChartSpec::stacked_over_time(
        format!("{} - CPU Breakdown", instance),
        datasets,
        Axis::percent().titled("CPU Utilization (%)"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::chart::DataPoint;
    use benchviz_core::{AggregatedReport, RunRecord};
    use std::collections::BTreeMap;

    fn with_runs(runs: &[(&str, f64)]) -> MetricRecord {
        let mut record = MetricRecord::new("100_cpu_utilization");
        record.metrics.runs = Some(
            runs.iter()
                .map(|(n, v)| (n.to_string(), RunRecord::new(*v, "4", "30")))
                .collect::<BTreeMap<_, _>>(),
        );
        record
    }

    fn sample(time: &str, util: f64) -> TimeSample {
        TimeSample {
            time: time.to_string(),
            utilization: util,
            usr: util - 1.0,
            sys: 1.0,
            iowait: 0.0,
        }
    }

    #[test]
    fn test_one_chart_per_run_plus_comparison() {
        let mut report = AggregatedReport::new();
        report.insert("arm", with_runs(&[("light", 25.0), ("heavy", 98.0)]));
        report.insert("x86", with_runs(&[("heavy", 96.0)]));
        let section = Section::new(&report, "100_cpu_utilization");

        let charts = CpuCharts.charts(&section);
        let titles: Vec<&str> = charts.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "CPU Utilization - Heavy",
                "CPU Utilization - Light",
                "CPU Utilization Comparison"
            ]
        );
        // x86 has no light run
        assert_eq!(run_values(&section, "light"), vec![25.0, 0.0]);
    }

    #[test]
    fn test_flat_average_chart_without_runs() {
        let mut report = AggregatedReport::new();
        let mut record = MetricRecord::new("100_cpu_utilization");
        record.metrics.average_utilization = Some(vec![87.5]);
        report.insert("arm", record);
        report.ensure_instance("empty");

        let section = Section::new(&report, "100_cpu_utilization");
        let charts = CpuCharts.charts(&section);
        assert_eq!(charts.len(), 1);
        assert_eq!(
            charts[0].data.datasets[0].data,
            vec![DataPoint::Value(87.5), DataPoint::Value(0.0)]
        );
    }

    #[test]
    fn test_time_series_adds_overlay_and_breakdowns() {
        let mut report = AggregatedReport::new();
        let mut arm = MetricRecord::new("100_cpu_utilization");
        arm.metrics.time_series = Some(vec![sample("12:00:01", 50.0), sample("12:00:02", 60.0)]);
        let mut x86 = arm.clone();
        x86.metrics.time_series = Some(vec![sample("12:00:01", 40.0)]);
        report.insert("arm", arm);
        report.insert("x86", x86);

        let section = Section::new(&report, "100_cpu_utilization");
        let charts = CpuCharts.charts(&section);

        // average bar + overlay + one breakdown per instance
        assert_eq!(charts.len(), 4);
        assert_eq!(charts[1].kind, ChartKind::Line);
        assert_eq!(charts[1].data.datasets.len(), 2);
        assert_eq!(charts[2].title, "arm - CPU Breakdown");
        assert_eq!(charts[2].data.datasets.len(), 4);
        assert_eq!(charts[2].data.datasets[3].kind, Some(ChartKind::Line));
    }
}
