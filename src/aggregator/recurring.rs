//! Recurring-error aggregation
//!
//! Reduces a batch of error records to a ranked, deduplicated and bounded
//! summary. Records are grouped by `(source, event_id)`, counted, ranked by
//! count with first-seen order breaking ties, and each selected group is
//! illustrated by the message of its most recent record.

use crate::error::AggregationError;
use crate::events::LogRecord;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source substituted for records that carry none
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Event id substituted for records that carry none
pub const UNKNOWN_EVENT_ID: u32 = 0;

/// Default maximum length of a sample message, in characters
pub const DEFAULT_SAMPLE_CHARS: usize = 200;

/// Appended to sample messages that were cut short
pub const TRUNCATION_MARKER: &str = "...";

/// Sample message used when the matching record has no text
pub const NO_MESSAGE: &str = "N/A";

pub const NO_ERRORS_FOUND: &str = "No errors found to analyze.";
pub const NO_RECURRING_ERRORS: &str = "No recurring errors found.";
pub const COUNTING_FAILED: &str = "Error during error counting.";

/// Identity of a logical error type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub source: String,
    pub event_id: u32,
}

impl GroupKey {
    /// Resolve the grouping key of a record, substituting sentinels for missing fields
    pub fn of(record: &LogRecord) -> Self {
        let source = match record.source.as_deref().map(str::trim) {
            Some(source) if !source.is_empty() => source.to_string(),
            _ => UNKNOWN_SOURCE.to_string(),
        };

        Self {
            source,
            event_id: record.event_id.unwrap_or(UNKNOWN_EVENT_ID),
        }
    }
}

/// One row of the recurring-error summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorGroup {
    /// Source part of the grouping key
    pub source: String,
    /// Event id part of the grouping key
    pub event_id: u32,
    /// Number of records sharing this key, at least 1
    pub count: usize,
    /// Message of the most recent matching record, truncated for display
    pub sample_message: String,
}

/// Output of one aggregation: display text plus the structured groups
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecurringErrors {
    /// Multi-line human-readable summary
    pub summary: String,
    /// Groups in ranked order
    pub groups: Vec<ErrorGroup>,
}

impl RecurringErrors {
    fn without_groups(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            groups: Vec::new(),
        }
    }

    /// Whether no group was selected
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of the counts of all returned groups
    pub fn total_count(&self) -> usize {
        self.groups.iter().map(|group| group.count).sum()
    }
}

/// Groups and ranks recurring errors
///
/// The aggregator holds no state between calls; it is safe to share across
/// threads as long as each call works on its own record slice.
#[derive(Debug, Clone, Copy)]
pub struct RecurringErrorAggregator {
    sample_chars: usize,
}

impl Default for RecurringErrorAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CHARS)
    }
}

impl RecurringErrorAggregator {
    /// Create an aggregator that truncates sample messages to `sample_chars` characters
    pub fn new(sample_chars: usize) -> Self {
        Self { sample_chars }
    }

    /// Find the `top_n` most frequent error types in `records`
    ///
    /// Never fails: an empty batch, a `top_n` of zero and internal counting
    /// faults all produce a result without groups and an explanatory summary.
    pub fn aggregate(&self, records: &[LogRecord], top_n: usize) -> RecurringErrors {
        if records.is_empty() {
            warn!("No error logs provided for analysis");
            return RecurringErrors::without_groups(NO_ERRORS_FOUND);
        }

        info!(
            "Analyzing {} error logs to find top {} recurring errors",
            records.len(),
            top_n
        );

        self.summarize(records, rank_keys(records, top_n))
    }

    /// Turn a ranking into groups and summary text
    ///
    /// A failed ranking yields no groups and the `COUNTING_FAILED` summary.
    fn summarize(
        &self,
        records: &[LogRecord],
        ranking: Result<Vec<(GroupKey, usize)>, AggregationError>,
    ) -> RecurringErrors {
        let ranked = match ranking {
            Ok(ranked) => ranked,
            Err(e) => {
                error!("Failed to count recurring errors: {}", e);
                return RecurringErrors::without_groups(COUNTING_FAILED);
            }
        };

        if ranked.is_empty() {
            info!("No recurring errors found matching the criteria");
            return RecurringErrors::without_groups(NO_RECURRING_ERRORS);
        }

        info!("Found {} distinct recurring errors", ranked.len());

        let mut lines = vec![format!("--- Top {} Recurring Errors ---", ranked.len())];
        let mut groups = Vec::with_capacity(ranked.len());

        for (key, count) in ranked {
            let sample_message = self.sample_message(records, &key);
            let line = format!(
                "Source: {}, Event ID: {}, Count: {}",
                key.source, key.event_id, count
            );
            debug!("Recurring error: {} | Sample: {}", line, sample_message);
            lines.push(line);

            groups.push(ErrorGroup {
                source: key.source,
                event_id: key.event_id,
                count,
                sample_message,
            });
        }

        RecurringErrors {
            summary: lines.join("\n"),
            groups,
        }
    }

    /// Message of the last record in input order that matches `key`
    fn sample_message(&self, records: &[LogRecord], key: &GroupKey) -> String {
        records
            .iter()
            .rev()
            .find(|record| GroupKey::of(record) == *key)
            .map(|record| truncate_message(&record.message, self.sample_chars))
            .unwrap_or_else(|| NO_MESSAGE.to_string())
    }
}

/// Aggregate with the default sample length
pub fn aggregate(records: &[LogRecord], top_n: usize) -> RecurringErrors {
    RecurringErrorAggregator::default().aggregate(records, top_n)
}

/// Count occurrences per key, preserving first-seen order
fn count_keys(records: &[LogRecord]) -> Result<Vec<(GroupKey, usize)>, AggregationError> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut counts: Vec<(GroupKey, usize)> = Vec::new();

    for record in records {
        let key = GroupKey::of(record);
        match index.get(&key) {
            Some(&position) => {
                let (key, count) = &mut counts[position];
                increment(count, key)?;
            }
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    Ok(counts)
}

fn increment(count: &mut usize, key: &GroupKey) -> Result<(), AggregationError> {
    *count = count
        .checked_add(1)
        .ok_or_else(|| AggregationError::CountOverflow {
            source_name: key.source.clone(),
            event_id: key.event_id,
        })?;
    Ok(())
}

/// Select the `top_n` keys by descending count
///
/// The sort is stable, so keys with equal counts keep their first-seen order.
pub fn rank_keys(
    records: &[LogRecord],
    top_n: usize,
) -> Result<Vec<(GroupKey, usize)>, AggregationError> {
    let mut counts = count_keys(records)?;
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(top_n);
    Ok(counts)
}

/// Cut `message` to `max_chars` characters, marking the cut
///
/// Empty messages become `N/A` so downstream consumers never see a blank sample.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.is_empty() {
        return NO_MESSAGE.to_string();
    }

    match message.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &message[..cut], TRUNCATION_MARKER),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: Option<&str>, event_id: Option<u32>, message: &str) -> LogRecord {
        LogRecord::new(source, event_id, message)
    }

    #[test]
    fn test_dominant_key_ranks_first() {
        let mut records = Vec::new();
        for i in 0..8 {
            records.push(record(Some("Disk"), Some(7), &format!("disk failure {}", i)));
        }
        records.push(record(Some("Net"), Some(3), "link down"));
        records.push(record(Some("Net"), Some(3), "link flapping"));

        let result = aggregate(&records, 5);

        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.groups[0].source, "Disk");
        assert_eq!(result.groups[0].event_id, 7);
        assert_eq!(result.groups[0].count, 8);
        assert_eq!(result.groups[0].sample_message, "disk failure 7");
        assert_eq!(result.groups[1].source, "Net");
        assert_eq!(result.groups[1].event_id, 3);
        assert_eq!(result.groups[1].count, 2);
        assert_eq!(result.groups[1].sample_message, "link flapping");

        let mut lines = result.summary.lines();
        assert_eq!(lines.next(), Some("--- Top 2 Recurring Errors ---"));
        assert_eq!(lines.next(), Some("Source: Disk, Event ID: 7, Count: 8"));
        assert_eq!(lines.next(), Some("Source: Net, Event ID: 3, Count: 2"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_count_overflow_is_reported() {
        let key = GroupKey::of(&record(Some("Disk"), Some(7), "bad block"));
        let mut count = usize::MAX;

        assert_eq!(
            increment(&mut count, &key),
            Err(AggregationError::CountOverflow {
                source_name: "Disk".to_string(),
                event_id: 7,
            })
        );
        assert_eq!(count, usize::MAX);

        let mut count = 1;
        increment(&mut count, &key).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_counting_failure_degrades_to_summary() {
        let records = vec![record(Some("Disk"), Some(7), "bad block")];
        let overflow = AggregationError::CountOverflow {
            source_name: "Disk".to_string(),
            event_id: 7,
        };

        let result = RecurringErrorAggregator::default().summarize(&records, Err(overflow));

        assert_eq!(result.summary, COUNTING_FAILED);
        assert!(result.groups.is_empty());
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate(&[], 5);
        assert_eq!(result.summary, NO_ERRORS_FOUND);
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_missing_fields_use_sentinels() {
        let result = aggregate(&[record(None, None, "something broke")], 5);

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].source, UNKNOWN_SOURCE);
        assert_eq!(result.groups[0].event_id, UNKNOWN_EVENT_ID);
        assert_eq!(result.groups[0].count, 1);
        assert_eq!(result.groups[0].sample_message, "something broke");
    }

    #[test]
    fn test_blank_source_is_unknown() {
        let records = vec![record(Some("  "), Some(1), "a"), record(None, Some(1), "b")];
        let result = aggregate(&records, 5);

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].source, UNKNOWN_SOURCE);
        assert_eq!(result.groups[0].count, 2);
        assert_eq!(result.groups[0].sample_message, "b");
    }

    #[test]
    fn test_sample_uses_last_record_even_when_middle_is_empty() {
        let records = vec![
            record(Some("App"), Some(1), "A"),
            record(Some("App"), Some(1), ""),
            record(Some("App"), Some(1), "B"),
        ];
        let result = aggregate(&records, 5);

        assert_eq!(result.groups[0].count, 3);
        assert_eq!(result.groups[0].sample_message, "B");
    }

    #[test]
    fn test_empty_message_becomes_sentinel() {
        let result = aggregate(&[record(Some("App"), Some(1), "")], 5);
        assert_eq!(result.groups[0].sample_message, NO_MESSAGE);
    }

    #[test]
    fn test_top_n_zero_returns_no_groups() {
        let records = vec![record(Some("App"), Some(1), "A")];
        let result = aggregate(&records, 0);

        assert!(result.groups.is_empty());
        assert_eq!(result.summary, NO_RECURRING_ERRORS);
    }

    #[test]
    fn test_top_n_larger_than_distinct_keys() {
        let records = vec![
            record(Some("A"), Some(1), "x"),
            record(Some("B"), Some(2), "y"),
        ];
        let result = aggregate(&records, 100);
        assert_eq!(result.groups.len(), 2);
    }

    #[test]
    fn test_top_n_limits_groups() {
        let records = vec![
            record(Some("A"), Some(1), "x"),
            record(Some("B"), Some(2), "y"),
            record(Some("B"), Some(2), "y"),
            record(Some("C"), Some(3), "z"),
        ];
        let result = aggregate(&records, 1);

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].source, "B");
        assert!(result.summary.starts_with("--- Top 1 Recurring Errors ---"));
    }

    #[test]
    fn test_single_shared_key() {
        let records: Vec<_> = (0..6)
            .map(|i| record(Some("Kernel"), Some(41), &format!("m{}", i)))
            .collect();
        let result = aggregate(&records, 5);

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].count, 6);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let records = vec![
            record(Some("C"), Some(3), "c"),
            record(Some("A"), Some(1), "a"),
            record(Some("B"), Some(2), "b"),
            record(Some("A"), Some(1), "a"),
            record(Some("C"), Some(3), "c"),
            record(Some("B"), Some(2), "b"),
        ];
        let result = aggregate(&records, 5);
        let order: Vec<&str> = result.groups.iter().map(|g| g.source.as_str()).collect();

        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_same_source_different_event_ids_are_distinct() {
        let records = vec![
            record(Some("App"), Some(1), "x"),
            record(Some("App"), Some(2), "y"),
        ];
        let result = aggregate(&records, 5);
        assert_eq!(result.groups.len(), 2);
    }

    #[test]
    fn test_messages_do_not_affect_grouping() {
        let records = vec![
            record(Some("App"), Some(1), "disk C: full"),
            record(Some("App"), Some(1), "disk D: full"),
        ];
        let result = aggregate(&records, 5);

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].count, 2);
    }

    #[test]
    fn test_truncate_message() {
        let long = "x".repeat(250);
        let truncated = truncate_message(&long, 200);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with(TRUNCATION_MARKER));

        let exact = "y".repeat(200);
        assert_eq!(truncate_message(&exact, 200), exact);

        assert_eq!(truncate_message("short", 200), "short");
        assert_eq!(truncate_message("", 200), NO_MESSAGE);
    }

    #[test]
    fn test_truncate_message_counts_characters() {
        let long: String = "é".repeat(201);
        let truncated = truncate_message(&long, 200);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.starts_with(&"é".repeat(200)));
    }

    #[test]
    fn test_custom_sample_length() {
        let aggregator = RecurringErrorAggregator::new(4);
        let result = aggregator.aggregate(&[record(Some("App"), Some(1), "abcdefgh")], 5);
        assert_eq!(result.groups[0].sample_message, "abcd...");
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let records = vec![
            record(Some("A"), Some(1), "x"),
            record(Some("B"), Some(2), "y"),
            record(Some("A"), Some(1), "z"),
        ];
        assert_eq!(aggregate(&records, 5), aggregate(&records, 5));
    }

    #[test]
    fn test_rank_keys_counts() {
        let records = vec![
            record(Some("A"), Some(1), "x"),
            record(None, None, "y"),
            record(Some("A"), Some(1), "z"),
        ];
        let ranked = rank_keys(&records, 5).unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.source, "A");
        assert_eq!(ranked[0].1, 2);
        assert_eq!(ranked[1].0.source, UNKNOWN_SOURCE);
        assert_eq!(ranked[1].1, 1);
    }

    #[test]
    fn test_error_group_serialization_field_names() {
        let group = ErrorGroup {
            source: "Disk".to_string(),
            event_id: 7,
            count: 8,
            sample_message: "bad block".to_string(),
        };
        let json = serde_json::to_value(&group).unwrap();

        assert_eq!(json["source"], "Disk");
        assert_eq!(json["event_id"], 7);
        assert_eq!(json["count"], 8);
        assert_eq!(json["sample_message"], "bad block");
    }
}
