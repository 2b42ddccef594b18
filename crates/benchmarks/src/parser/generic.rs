// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fallback parser for benchmark kinds without a dedicated strategy.

use super::{extract_system_info, ParseInput, ParseStrategy};
use benchviz_core::{MetricRecord, MetricValue, ParseOutcome, Table};
use std::collections::BTreeMap;

/// Extracts `key: value` lines and pipe-delimited ASCII tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericParser;

impl ParseStrategy for GenericParser {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn parse(&self, input: &ParseInput<'_>, mut record: MetricRecord) -> ParseOutcome {
        record.system_info = extract_system_info(input.content);

        let values = key_values(input.content);
        let tables = ascii_tables(input.content);

        if values.is_empty() && tables.is_empty() {
            return ParseOutcome::Unparsable {
                record,
                reason: format!("no key/value pairs or tables in {}", input.file_name),
            };
        }

        record.metrics.values = values;
        if !tables.is_empty() {
            record.metrics.tables = Some(tables);
        }
        ParseOutcome::Parsed(record)
    }
}

/// Normalize a metric key: trimmed, lower-cased, spaces to underscores.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Every `key: value` line, split at the first colon. Later lines
/// overwrite earlier ones with the same key.
pub fn key_values(content: &str) -> BTreeMap<String, MetricValue> {
    let mut values = BTreeMap::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = normalize_key(key);
        if key.is_empty() {
            continue;
        }
        values.insert(key, MetricValue::coerce(value));
    }
    values
}

fn is_separator(line: &str) -> bool {
    line.contains('|') && line.contains("-+-")
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Tables opened by a separator row. Rows are collected until the first
/// line without a `|`; further separators inside a table are skipped.
pub fn ascii_tables(content: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Table = Vec::new();
    let mut in_table = false;

    for line in content.lines() {
        if is_separator(line) {
            in_table = true;
            continue;
        }
        if in_table && line.contains('|') {
            current.push(split_row(line));
        } else if in_table {
            if !current.is_empty() {
                tables.push(std::mem::take(&mut current));
            }
            in_table = false;
        }
    }
    if !current.is_empty() {
        tables.push(current);
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_content;
    use benchviz_core::BenchmarkKind;

    fn parse(content: &str) -> ParseOutcome {
        let kind = BenchmarkKind::from_dir_name("400_io_performance");
        let input = ParseInput::new("box__benchmark_results.txt", content, &kind);
        parse_content(&input)
    }

    #[test]
    fn test_key_values_are_normalized_and_coerced() {
        let record = parse(
            "Sequential Read: 512.25\nOps Completed: 1200\nDevice: nvme0n1\nOps Completed: 1300\n",
        )
        .into_record();

        let values = &record.metrics.values;
        assert_eq!(values["sequential_read"], MetricValue::Float(512.25));
        assert_eq!(values["ops_completed"], MetricValue::Int(1300));
        assert_eq!(values["device"], MetricValue::Text("nvme0n1".into()));
        assert_eq!(record.benchmark_type, "400_io_performance");
    }

    #[test]
    fn test_ascii_tables() {
        let content = "\
 size | latency
|------+--------|
   4K | 0.12
  64K | 0.40

 threads | ops
|---------+-----|
       1 | 10
";
        let tables = ascii_tables(content);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0], vec![vec!["4K", "0.12"], vec!["64K", "0.40"]]);
        assert_eq!(tables[1], vec![vec!["1", "10"]]);
    }

    #[test]
    fn test_table_only_output_is_parsed() {
        let outcome = parse("|---+---|\n| 1 | 2 |\n");
        assert!(matches!(outcome, ParseOutcome::Parsed(_)));
        assert!(outcome.record().metrics.tables.is_some());
    }

    #[test]
    fn test_shapeless_output_is_unparsable() {
        let outcome = parse("just some words\nand more words\n");
        assert!(!outcome.is_usable());
        assert!(outcome.record().metrics.is_empty());
    }

    #[test]
    fn test_empty_keys_are_skipped() {
        let values = key_values(": orphan\n  : another\n");
        assert!(values.is_empty());
    }
}
