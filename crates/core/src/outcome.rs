// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parse outcome.
//!
//! Parsing never fails hard. Instead each file yields one of three
//! outcomes, all of which still carry a record the aggregator can merge.

use crate::model::MetricRecord;

/// Result of parsing one benchmark output file.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The expected shape was found.
    Parsed(MetricRecord),
    /// Some values were missing and defaults were substituted.
    Partial {
        record: MetricRecord,
        /// Names of the metrics that were default-filled.
        defaults: Vec<&'static str>,
    },
    /// Nothing usable was found. The record carries no metrics.
    Unparsable { record: MetricRecord, reason: String },
}

impl ParseOutcome {
    /// Build an unparsable outcome with an empty record.
    pub fn unparsable(benchmark_type: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseOutcome::Unparsable {
            record: MetricRecord::new(benchmark_type),
            reason: reason.into(),
        }
    }

    pub fn record(&self) -> &MetricRecord {
        match self {
            ParseOutcome::Parsed(record)
            | ParseOutcome::Partial { record, .. }
            | ParseOutcome::Unparsable { record, .. } => record,
        }
    }

    pub fn into_record(self) -> MetricRecord {
        match self {
            ParseOutcome::Parsed(record)
            | ParseOutcome::Partial { record, .. }
            | ParseOutcome::Unparsable { record, .. } => record,
        }
    }

    /// True for `Parsed` and `Partial`.
    pub fn is_usable(&self) -> bool {
        !matches!(self, ParseOutcome::Unparsable { .. })
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ParseOutcome::Parsed(_) => "parsed",
            ParseOutcome::Partial { .. } => "partial",
            ParseOutcome::Unparsable { .. } => "unparsable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparsable_carries_empty_record() {
        let outcome = ParseOutcome::unparsable("400_io_performance", "empty file");
        assert!(!outcome.is_usable());
        assert_eq!(outcome.label(), "unparsable");
        assert!(outcome.record().metrics.is_empty());
        assert_eq!(outcome.into_record().benchmark_type, "400_io_performance");
    }

    #[test]
    fn test_partial_is_usable() {
        let outcome = ParseOutcome::Partial {
            record: MetricRecord::new("100_cpu_utilization"),
            defaults: vec!["average_utilization"],
        };
        assert!(outcome.is_usable());
    }
}
