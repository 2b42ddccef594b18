// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTML report rendering.
//!
//! [`render`] turns an [`AggregatedReport`] into a single self-contained
//! HTML page. Charts are drawn client-side by Chart.js; everything else is
//! static markup. Rendering is pure: identical input and options produce
//! byte-identical output.
//!
//! # Example
//!
//! ```
//! use benchviz_benchmarks::report::{render_with, ReportOptions};
//! use benchviz_core::{AggregatedReport, MetricRecord};
//!
//! let mut report = AggregatedReport::new();
//! let mut record = MetricRecord::new("100_cpu_utilization");
//! record.metrics.average_utilization = Some(vec![87.5]);
//! report.insert("graviton4", record);
//!
//! let html = render_with(&report, &ReportOptions::default());
//! assert!(html.contains("graviton4"));
//! ```

pub mod chart;
pub mod cpu;
pub mod generic;

use benchviz_core::{AggregatedReport, BenchmarkKind, MetricRecord};
use chart::ChartSpec;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use tracing::warn;

pub use cpu::CpuCharts;
pub use generic::GenericCharts;

/// Chart.js bundle.
pub const CHART_JS_URL: &str = "https://cdn.jsdelivr.net/npm/chart.js";
/// Chart.js data-labels plugin.
pub const DATALABELS_URL: &str = "https://cdn.jsdelivr.net/npm/chartjs-plugin-datalabels@2";

/// Placeholder for missing system information.
const NOT_AVAILABLE: &str = "N/A";

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 20px; background-color: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; background-color: white; padding: 20px; border-radius: 5px; box-shadow: 0 0 10px rgba(0,0,0,0.1); }
        h1, h2, h3 { color: #333; }
        .benchmark { margin-bottom: 30px; padding: 15px; border: 1px solid #ddd; border-radius: 5px; }
        .chart-container { height: 400px; margin: 20px 0; }
        table { width: 100%; border-collapse: collapse; margin: 15px 0; }
        th, td { padding: 8px; text-align: left; border-bottom: 1px solid #ddd; }
        th { background-color: #f2f2f2; }
        .system-info { background-color: #f9f9f9; padding: 10px; border-radius: 5px; margin-bottom: 15px; }
        .failures td { color: #a94442; }
"#;

/// Creates a chart once the page is loaded, attaching the data-label
/// formatter that JSON cannot carry.
const CHART_HELPER: &str = r#"
        function benchvizChart(id, config, suffix) {
            document.addEventListener('DOMContentLoaded', function () {
                if (suffix !== null && config.options.plugins.datalabels) {
                    config.options.plugins.datalabels.formatter = function (value) {
                        var v = (value !== null && typeof value === 'object') ? value.y : value;
                        return Number(v).toFixed(1) + suffix;
                    };
                    config.plugins = [ChartDataLabels];
                }
                new Chart(document.getElementById(id).getContext('2d'), config);
            });
        }
"#;

/// Page-level rendering options.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    /// Page title and top-level heading.
    pub title: String,
    /// Timestamp printed under the heading. Omitted when `None`.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: "Benchmark Results".to_string(),
            generated_at: None,
        }
    }
}

impl ReportOptions {
    /// Default options stamped with the current time.
    pub fn now() -> Self {
        Self {
            generated_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// One benchmark type across every instance in the report.
#[derive(Debug, Clone)]
pub struct Section<'a> {
    pub benchmark: &'a str,
    /// Every instance in the report, in name order, with its record for
    /// this benchmark if it has one.
    pub entries: Vec<(&'a str, Option<&'a MetricRecord>)>,
}

impl<'a> Section<'a> {
    pub fn new(report: &'a AggregatedReport, benchmark: &'a str) -> Self {
        Self {
            benchmark,
            entries: report.section(benchmark),
        }
    }

    /// Instance names, used as category labels.
    pub fn instance_labels(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.to_string()).collect()
    }
}

/// Chart layout for one benchmark kind.
pub trait ChartStrategy: Send + Sync {
    fn charts(&self, section: &Section<'_>) -> Vec<ChartSpec>;
}

static CPU_CHARTS: CpuCharts = CpuCharts;
static GENERIC_CHARTS: GenericCharts = GenericCharts;

/// Chart layout bound to a benchmark kind.
pub fn strategy_for(kind: &BenchmarkKind) -> &'static dyn ChartStrategy {
    match kind {
        BenchmarkKind::CpuUtilization => &CPU_CHARTS,
        BenchmarkKind::Generic(_) => &GENERIC_CHARTS,
    }
}

/// Render with default options (no timestamp).
pub fn render(report: &AggregatedReport) -> String {
    render_with(report, &ReportOptions::default())
}

/// Render the full HTML page.
pub fn render_with(report: &AggregatedReport, options: &ReportOptions) -> String {
    let mut html = String::new();
    let title = escape_html(&options.title);

    writeln!(html, "<!DOCTYPE html>").unwrap();
    writeln!(html, "<html lang=\"en\">").unwrap();
    writeln!(html, "<head>").unwrap();
    writeln!(html, "    <meta charset=\"UTF-8\">").unwrap();
    writeln!(
        html,
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
    )
    .unwrap();
    writeln!(html, "    <title>{}</title>", title).unwrap();
    writeln!(html, "    <script src=\"{}\"></script>", CHART_JS_URL).unwrap();
    writeln!(html, "    <script src=\"{}\"></script>", DATALABELS_URL).unwrap();
    writeln!(html, "    <script>{}    </script>", CHART_HELPER).unwrap();
    writeln!(html, "    <style>{}    </style>", STYLE).unwrap();
    writeln!(html, "</head>").unwrap();
    writeln!(html, "<body>").unwrap();
    writeln!(html, "<div class=\"container\">").unwrap();
    writeln!(html, "<h1>{}</h1>", title).unwrap();
    if let Some(at) = options.generated_at {
        writeln!(html, "<p>Generated on: {}</p>", at.format("%Y-%m-%d %H:%M:%S UTC")).unwrap();
    }

    if report.is_empty() {
        writeln!(html, "<p>No benchmark results found.</p>").unwrap();
    }

    for (index, benchmark) in report.benchmark_types().iter().enumerate() {
        let section = Section::new(report, benchmark);
        render_section(&mut html, index, &section);
    }

    if !report.failures.is_empty() {
        render_failures(&mut html, report);
    }

    writeln!(html, "</div>").unwrap();
    writeln!(html, "</body>").unwrap();
    writeln!(html, "</html>").unwrap();
    html
}

fn render_section(html: &mut String, index: usize, section: &Section<'_>) {
    writeln!(html, "<section class=\"benchmark\">").unwrap();
    writeln!(html, "<h2>Benchmark: {}</h2>", escape_html(section.benchmark)).unwrap();
    render_system_info(html, section);

    let kind = BenchmarkKind::from_dir_name(section.benchmark);
    let charts = strategy_for(&kind).charts(section);
    for (n, chart) in charts.iter().enumerate() {
        render_chart(html, &format!("chart-{}-{}", index, n), chart);
    }

    writeln!(html, "</section>").unwrap();
}

fn render_system_info(html: &mut String, section: &Section<'_>) {
    writeln!(html, "<div class=\"system-info\">").unwrap();
    writeln!(html, "<h3>System Information</h3>").unwrap();
    writeln!(html, "<table>").unwrap();
    writeln!(
        html,
        "<tr><th>Instance</th><th>Architecture</th><th>CPU Model</th><th>CPU Cores</th></tr>"
    )
    .unwrap();

    for (instance, record) in &section.entries {
        let info = record.map(|r| &r.system_info);
        let architecture = info.and_then(|i| i.architecture.as_deref());
        let model = info.and_then(|i| i.cpu_model.as_deref());
        let cores = info.and_then(|i| i.cpu_cores).map(|c| c.to_string());

        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(instance),
            escape_html(architecture.unwrap_or(NOT_AVAILABLE)),
            escape_html(model.unwrap_or(NOT_AVAILABLE)),
            escape_html(cores.as_deref().unwrap_or(NOT_AVAILABLE)),
        )
        .unwrap();
    }

    writeln!(html, "</table>").unwrap();
    writeln!(html, "</div>").unwrap();
}

fn render_chart(html: &mut String, id: &str, chart: &ChartSpec) {
    let config = match chart.to_script_json() {
        Ok(config) => config,
        Err(e) => {
            warn!(chart = %chart.title, error = %e, "failed to serialize chart");
            return;
        }
    };
    let suffix = match chart.label_suffix {
        Some(suffix) => format!("\"{}\"", suffix),
        None => "null".to_string(),
    };

    writeln!(html, "<h3>{}</h3>", escape_html(&chart.title)).unwrap();
    writeln!(
        html,
        "<div class=\"chart-container\"><canvas id=\"{}\"></canvas></div>",
        id
    )
    .unwrap();
    writeln!(
        html,
        "<script>benchvizChart(\"{}\", {}, {});</script>",
        id, config, suffix
    )
    .unwrap();
}

fn render_failures(html: &mut String, report: &AggregatedReport) {
    writeln!(html, "<section class=\"benchmark failures\">").unwrap();
    writeln!(html, "<h2>Run Failures</h2>").unwrap();
    writeln!(html, "<table>").unwrap();
    writeln!(html, "<tr><th>Instance</th><th>Benchmark</th><th>Error</th></tr>").unwrap();
    for failure in &report.failures {
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&failure.instance),
            escape_html(&failure.benchmark),
            escape_html(&failure.message),
        )
        .unwrap();
    }
    writeln!(html, "</table>").unwrap();
    writeln!(html, "</section>").unwrap();
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `heavy_load` → `Heavy Load`.
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Number of `<canvas>` elements in a rendered page.
pub fn chart_count(html: &str) -> usize {
    html.matches("<canvas ").count()
}

/// Number of benchmark sections in a rendered page, failures excluded.
pub fn section_count(html: &str) -> usize {
    html.matches("<section class=\"benchmark\">").count()
}
