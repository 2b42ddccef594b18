// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Charts for benchmark kinds without a dedicated layout.

use super::chart::{Axis, ChartSpec, Dataset, TEAL};
use super::{ChartStrategy, Section};
use std::collections::BTreeSet;

/// One bar chart per numeric metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericCharts;

impl ChartStrategy for GenericCharts {
    fn charts(&self, section: &Section<'_>) -> Vec<ChartSpec> {
        numeric_keys(section)
            .into_iter()
            .map(|key| {
                let values = section
                    .entries
                    .iter()
                    .map(|(_, record)| {
                        record
                            .and_then(|r| r.metrics.numeric(key))
                            .unwrap_or(0.0)
                    })
                    .collect();
                ChartSpec::bar(
                    format!("Metric: {}", key),
                    section.instance_labels(),
                    vec![Dataset::bars(key, values, TEAL)],
                    Axis::values(),
                    "",
                )
            })
            .collect()
    }
}

/// Keys holding a number in at least one instance, sorted.
fn numeric_keys<'a>(section: &Section<'a>) -> BTreeSet<&'a str> {
    section
        .entries
        .iter()
        .filter_map(|(_, record)| *record)
        .flat_map(|record| {
            record
                .metrics
                .values
                .iter()
                .filter(|(_, value)| value.as_f64().is_some())
                .map(|(key, _)| key.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchviz_core::{AggregatedReport, MetricRecord, MetricValue};

    fn record(values: &[(&str, MetricValue)]) -> MetricRecord {
        let mut record = MetricRecord::new("400_io_performance");
        for (key, value) in values {
            record.metrics.values.insert(key.to_string(), value.clone());
        }
        record
    }

    #[test]
    fn test_numeric_keys_only() {
        let mut report = AggregatedReport::new();
        report.insert(
            "arm",
            record(&[
                ("write_mb_s", MetricValue::Float(410.0)),
                ("device", MetricValue::Text("nvme0n1".into())),
            ]),
        );
        report.insert("x86", record(&[("read_mb_s", MetricValue::Int(900))]));

        let section = Section::new(&report, "400_io_performance");
        let charts = GenericCharts.charts(&section);

        let titles: Vec<&str> = charts.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Metric: read_mb_s", "Metric: write_mb_s"]);
        assert_eq!(charts[0].label_suffix, Some(""));
    }

    #[test]
    fn test_missing_values_chart_as_zero() {
        let mut report = AggregatedReport::new();
        report.insert("arm", record(&[("iops", MetricValue::Int(1200))]));
        report.ensure_instance("x86");

        let section = Section::new(&report, "400_io_performance");
        let charts = GenericCharts.charts(&section);
        let json = charts[0].to_script_json().unwrap();
        assert!(json.contains(r#""data":[1200.0,0.0]"#));
    }
}
