// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chart.js configuration model.
//!
//! A [`ChartSpec`] serializes to the configuration object Chart.js expects.
//! Data-label formatters are JavaScript functions and cannot travel through
//! JSON; the page helper attaches them based on [`ChartSpec::label_suffix`].

use serde::Serialize;

/// Blue used for single-dataset utilization bars.
pub const PRIMARY: Color = Color::rgb(54, 162, 235);
/// Teal used for totals and generic metrics.
pub const TEAL: Color = Color::rgb(75, 192, 192);

/// Palette cycled through for multi-dataset charts, in order.
pub const PALETTE: [Color; 6] = [
    Color::rgb(255, 99, 132),
    Color::rgb(54, 162, 235),
    Color::rgb(255, 205, 86),
    Color::rgb(75, 192, 192),
    Color::rgb(153, 102, 255),
    Color::rgb(255, 159, 64),
];

/// An opaque RGB colour rendered as `rgba(...)` with a chosen alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Palette entry for index `i`, wrapping around.
    pub fn nth(i: usize) -> Self {
        PALETTE[i % PALETTE.len()]
    }

    pub fn rgba(&self, alpha: f32) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

/// A bar value or a `{x, y}` point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataPoint {
    Value(f64),
    Point { x: String, y: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<DataPoint>,
    /// Per-dataset override of the chart type (mixed charts).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChartKind>,
    pub background_color: String,
    pub border_color: String,
    pub border_width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
    /// Draw order; lower is drawn on top.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl Dataset {
    /// Bar dataset with a translucent fill.
    pub fn bars(label: impl Into<String>, values: Vec<f64>, color: Color) -> Self {
        Self {
            label: label.into(),
            data: values.into_iter().map(DataPoint::Value).collect(),
            kind: None,
            background_color: color.rgba(0.5),
            border_color: color.rgba(1.0),
            border_width: 1,
            fill: None,
            tension: None,
            order: None,
        }
    }

    /// Unfilled line through `(time, value)` points.
    pub fn line(label: impl Into<String>, points: Vec<(String, f64)>, color: Color) -> Self {
        Self {
            label: label.into(),
            data: points
                .into_iter()
                .map(|(x, y)| DataPoint::Point { x, y })
                .collect(),
            kind: None,
            background_color: color.rgba(0.1),
            border_color: color.rgba(1.0),
            border_width: 2,
            fill: Some(false),
            tension: Some(0.1),
            order: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTitle {
    pub display: bool,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_at_zero: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<AxisTitle>,
}

impl Axis {
    /// Value axis starting at zero.
    pub fn values() -> Self {
        Self {
            begin_at_zero: Some(true),
            ..Default::default()
        }
    }

    /// Value axis bounded to `[0, 100]`.
    pub fn percent() -> Self {
        Self {
            max: Some(100.0),
            ..Self::values()
        }
    }

    /// Category axis of sample times.
    pub fn time() -> Self {
        Self {
            kind: Some("category"),
            ..Default::default()
        }
        .titled("Time")
    }

    pub fn titled(mut self, text: &str) -> Self {
        self.title = Some(AxisTitle {
            display: true,
            text: text.to_string(),
        });
        self
    }

    pub fn stacked(mut self) -> Self {
        self.stacked = Some(true);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scales {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Axis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataLabels {
    pub anchor: &'static str,
    pub align: &'static str,
    pub font: Font,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Font {
    pub weight: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub display: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plugins {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datalabels: Option<DataLabels>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    pub responsive: bool,
    pub maintain_aspect_ratio: bool,
    pub plugins: Plugins,
    pub scales: Scales,
}

/// One chart, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: ChartOptions,
    /// Heading shown above the canvas.
    #[serde(skip)]
    pub title: String,
    /// Suffix appended to data labels (`"%"`, or empty). `None` disables
    /// data labels.
    #[serde(skip)]
    pub label_suffix: Option<&'static str>,
}

impl ChartSpec {
    fn new(kind: ChartKind, title: impl Into<String>, data: ChartData, y: Axis) -> Self {
        Self {
            kind,
            data,
            options: ChartOptions {
                responsive: true,
                maintain_aspect_ratio: false,
                plugins: Plugins::default(),
                scales: Scales {
                    x: None,
                    y: Some(y),
                },
            },
            title: title.into(),
            label_suffix: None,
        }
    }

    /// Bar chart over categorical labels with value labels on each bar.
    pub fn bar(
        title: impl Into<String>,
        labels: Vec<String>,
        datasets: Vec<Dataset>,
        y: Axis,
        suffix: &'static str,
    ) -> Self {
        let data = ChartData {
            labels: Some(labels),
            datasets,
        };
        Self::new(ChartKind::Bar, title, data, y).with_data_labels(suffix)
    }

    /// Line chart over `{x, y}` points on a time axis.
    pub fn time_lines(title: impl Into<String>, datasets: Vec<Dataset>, y: Axis) -> Self {
        let data = ChartData {
            labels: None,
            datasets,
        };
        let mut spec = Self::new(ChartKind::Line, title, data, y);
        spec.options.scales.x = Some(Axis::time());
        spec.options.plugins.legend = Some(Legend { display: true });
        spec
    }

    /// Stacked bars over time with mixed-in line datasets.
    pub fn stacked_over_time(title: impl Into<String>, datasets: Vec<Dataset>, y: Axis) -> Self {
        let data = ChartData {
            labels: None,
            datasets,
        };
        let mut spec = Self::new(ChartKind::Bar, title, data, y.stacked());
        spec.options.scales.x = Some(Axis::time().stacked());
        spec
    }

    fn with_data_labels(mut self, suffix: &'static str) -> Self {
        self.options.plugins.datalabels = Some(DataLabels {
            anchor: "end",
            align: "top",
            font: Font { weight: "bold" },
        });
        self.label_suffix = Some(suffix);
        self
    }

    /// JSON configuration, safe to embed inside a `<script>` element.
    ///
    /// `<`, `>` and `&` only ever occur inside JSON strings, where their
    /// `\u` escapes are equivalent.
    pub fn to_script_json(&self) -> serde_json::Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(json
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_chart_json_shape() {
        let spec = ChartSpec::bar(
            "CPU",
            vec!["arm".into(), "x86".into()],
            vec![Dataset::bars("Heavy", vec![97.5, 0.0], PRIMARY)],
            Axis::percent(),
            "%",
        );
        let value: serde_json::Value =
            serde_json::from_str(&spec.to_script_json().unwrap()).unwrap();

        assert_eq!(value["type"], "bar");
        assert_eq!(value["data"]["labels"][1], "x86");
        assert_eq!(value["data"]["datasets"][0]["data"][0], 97.5);
        assert_eq!(value["data"]["datasets"][0]["backgroundColor"], "rgba(54, 162, 235, 0.5)");
        assert_eq!(value["options"]["scales"]["y"]["max"], 100.0);
        assert_eq!(value["options"]["maintainAspectRatio"], false);
        assert!(value.get("title").is_none());
    }

    #[test]
    fn test_line_points_serialize_as_xy() {
        let spec = ChartSpec::time_lines(
            "Over time",
            vec![Dataset::line("arm", vec![("12:00:01".into(), 55.0)], Color::nth(0))],
            Axis::percent(),
        );
        let json = spec.to_script_json().unwrap();
        assert!(json.contains(r#"{"x":"12:00:01","y":55.0}"#));
        assert!(json.contains(r#""type":"category""#));
        assert!(spec.label_suffix.is_none());
    }

    #[test]
    fn test_script_json_escapes_closing_tags() {
        let spec = ChartSpec::bar(
            "x",
            vec!["</script><b>".into()],
            Vec::new(),
            Axis::values(),
            "",
        );
        assert!(!spec.to_script_json().unwrap().contains("</script>"));
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(Color::nth(0), Color::nth(PALETTE.len()));
    }
}
