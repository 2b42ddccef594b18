// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! `mpstat` time series.

use super::ParseInput;
use benchviz_core::{clamp_percent, round2, MetricRecord, ParseOutcome, TimeSample};
use once_cell::sync::Lazy;
use regex::Regex;

static SAMPLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}\s+all\s+").expect("valid mpstat regex"));

/// Timestamp, `all`, and at least nine numeric columns.
const MIN_FIELDS: usize = 11;

const USR_FIELD: usize = 2;
const SYS_FIELD: usize = 4;
const IOWAIT_FIELD: usize = 5;

/// True when the file name or content says this is `mpstat` output.
pub fn looks_like_mpstat(file_name: &str, content: &str) -> bool {
    file_name.to_lowercase().contains("mpstat") || content.contains("Average:")
}

/// Samples of the aggregate `all` row, in file order.
///
/// Per-core rows, headers and `Average:` summaries are skipped, as is any
/// row with a non-numeric column where a number is expected.
pub fn parse_time_series(content: &str) -> Vec<TimeSample> {
    content
        .lines()
        .filter(|line| SAMPLE_LINE.is_match(line))
        .filter_map(parse_sample)
        .collect()
}

fn parse_sample(line: &str) -> Option<TimeSample> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }
    let number = |idx: usize| fields[idx].parse::<f64>().ok();

    let idle = fields.last()?.parse::<f64>().ok()?;
    Some(TimeSample {
        time: fields[0].to_string(),
        utilization: round2(clamp_percent(100.0 - idle)),
        usr: round2(number(USR_FIELD)?),
        sys: round2(number(SYS_FIELD)?),
        iowait: round2(number(IOWAIT_FIELD)?),
    })
}

pub(crate) fn parse(input: &ParseInput<'_>, mut record: MetricRecord) -> ParseOutcome {
    let samples = parse_time_series(input.content);
    if samples.is_empty() {
        return ParseOutcome::Unparsable {
            record,
            reason: "no mpstat samples for the all-CPU row".to_string(),
        };
    }
    record.metrics.time_series = Some(samples);
    ParseOutcome::Parsed(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MPSTAT: &str = "\
Linux 6.8.0-1009-aws (ip-172-31-5-9) \t05/14/25 \t_aarch64_\t(4 CPU)

14:02:11     CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle
14:02:12     all   97.25    0.00    2.50    0.00    0.00    0.25    0.00    0.00    0.00    0.00
14:02:12       0   99.00    0.00    1.00    0.00    0.00    0.00    0.00    0.00    0.00    0.00
14:02:13     all   60.10    0.00    3.15    0.40    0.00    0.10    0.00    0.00    0.00   36.25
Average:     all   78.68    0.00    2.83    0.20    0.00    0.18    0.00    0.00    0.00   18.13
";

    #[test]
    fn test_parses_all_rows_only() {
        let samples = parse_time_series(MPSTAT);
        assert_eq!(samples.len(), 2);

        assert_eq!(samples[0].time, "14:02:12");
        assert_eq!(samples[0].utilization, 100.0);
        assert_eq!(samples[0].usr, 97.25);
        assert_eq!(samples[0].sys, 2.5);

        assert_eq!(samples[1].utilization, 63.75);
        assert_eq!(samples[1].iowait, 0.4);
    }

    #[test]
    fn test_utilization_is_rounded_complement_of_idle() {
        for idle in [0.0, 12.5, 33.33, 87.65, 99.99, 100.0] {
            let line = format!(
                "10:00:00 all 1.00 0.00 1.00 0.00 0.00 0.00 0.00 0.00 0.00 {:.2}",
                idle
            );
            let samples = parse_time_series(&line);
            assert_eq!(samples[0].utilization, round2(100.0 - idle));
        }
    }

    #[test]
    fn test_short_and_malformed_rows_are_skipped() {
        let content = "10:00:00 all 1.0 2.0 3.0\n10:00:01 all x 0 0 0 0 0 0 0 0 50\n";
        assert!(parse_time_series(content).is_empty());
    }

    #[test]
    fn test_detection() {
        assert!(looks_like_mpstat("box__MPSTAT_full_load.txt", ""));
        assert!(looks_like_mpstat("box__results.txt", "Average:  all 1 2 3"));
        assert!(!looks_like_mpstat(
            "box__results.txt",
            "Average CPU utilization (all cores): 50.0%"
        ));
    }
}
