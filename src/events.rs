//! Core record types for the event log analyzer
//!
//! This module defines the normalized shape of one error event as produced by
//! the log sources and consumed by the recurring-error aggregator.

use crate::error::CollectorError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Display format used for timestamps in exported artifacts
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One observed error event
///
/// Records are produced by a log source, read once per run and never mutated.
/// `source` and `event_id` are optional because real log entries do not always
/// carry them; the aggregator substitutes sentinels when grouping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    /// When the event was generated
    pub timestamp: Timestamp,
    /// Subsystem or application that raised the event
    pub source: Option<String>,
    /// Identifier scoped to `source`, not globally unique
    pub event_id: Option<u32>,
    /// Severity level reported by the source
    pub severity: Severity,
    /// Free-text description, may be empty
    pub message: String,
}

/// Severity level of a log record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Debug-level message
    Debug,
    /// Informational message
    Info,
    /// Warning that may require attention
    Warning,
    /// Error-level message indicating a problem
    Error,
    /// Critical failure (emergency, alert and critical syslog levels)
    Critical,
}

impl Severity {
    /// Whether records of this severity reach the aggregator
    pub fn is_error_class(self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }

    /// Map a syslog priority (0-7) to a severity
    pub fn from_syslog_priority(priority: u8) -> Self {
        match priority {
            0..=2 => Severity::Critical,
            3 => Severity::Error,
            4 => Severity::Warning,
            5 | 6 => Severity::Info,
            _ => Severity::Debug,
        }
    }

    /// Parse a severity name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "critical" | "crit" | "fault" | "emergency" | "emerg" | "alert" => {
                Some(Severity::Critical)
            }
            "error" | "err" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" | "information" | "notice" => Some(Severity::Info),
            "debug" => Some(Severity::Debug),
            _ => None,
        }
    }

    /// Upper-case label used in exports
    pub fn label(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl LogRecord {
    /// Create an error-severity record with the current time
    pub fn new(source: Option<&str>, event_id: Option<u32>, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.map(str::to_string),
            event_id,
            severity: Severity::Error,
            message: message.to_string(),
        }
    }

    /// Decode a record from one JSON object, tolerating malformed fields
    ///
    /// Field anomalies never reject the record: a bad `event_id` becomes `None`,
    /// a bad timestamp becomes the Unix epoch and an unknown severity becomes
    /// `Error`. Only input that is not a JSON object is rejected.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ParseError` if the line is not a JSON object.
    pub fn from_json(line: &str) -> Result<Self, CollectorError> {
        let value: Value = serde_json::from_str(line.trim())
            .map_err(|e| CollectorError::ParseError(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| CollectorError::ParseError("expected a JSON object".to_string()))?;

        let timestamp = object
            .get("timestamp")
            .and_then(parse_timestamp)
            .unwrap_or_else(|| {
                debug!("Record has no usable timestamp, using epoch");
                DateTime::<Utc>::UNIX_EPOCH
            });

        let source = object.get("source").and_then(lenient_string);

        let event_id = object.get("event_id").and_then(|raw| {
            let parsed = lenient_event_id(raw);
            if parsed.is_none() && !raw.is_null() {
                debug!("Ignoring malformed event_id {}", raw);
            }
            parsed
        });

        let severity = object
            .get("severity")
            .and_then(Value::as_str)
            .and_then(Severity::parse)
            .unwrap_or(Severity::Error);

        let message = object
            .get("message")
            .and_then(lenient_string)
            .unwrap_or_default();

        Ok(Self {
            timestamp,
            source,
            event_id,
            severity,
            message,
        })
    }
}

/// Interpret a JSON value as text; numbers and booleans are stringified
pub(crate) fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Interpret a JSON value as an event id; numeric strings are accepted
pub(crate) fn lenient_event_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|id| u32::try_from(id).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive))
                })
        }
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_record_serialization() {
        let record = LogRecord {
            timestamp: Utc::now(),
            source: Some("disk".to_string()),
            event_id: Some(7),
            severity: Severity::Error,
            message: "Bad block detected".to_string(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }

    #[test]
    fn test_from_json_complete_record() {
        let line = r#"{"timestamp": "2024-12-09T10:30:45Z", "source": "Disk", "event_id": 7, "severity": "error", "message": "The device has a bad block"}"#;
        let record = LogRecord::from_json(line).unwrap();

        assert_eq!(record.source.as_deref(), Some("Disk"));
        assert_eq!(record.event_id, Some(7));
        assert_eq!(record.severity, Severity::Error);
        assert_eq!(record.message, "The device has a bad block");
        assert_eq!(record.timestamp.to_rfc3339(), "2024-12-09T10:30:45+00:00");
    }

    #[test]
    fn test_from_json_plain_timestamp_format() {
        let line = r#"{"timestamp": "2024-12-09 10:30:45", "source": "Net", "event_id": 3, "message": "x"}"#;
        let record = LogRecord::from_json(line).unwrap();
        assert_eq!(
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "2024-12-09 10:30:45"
        );
    }

    #[test]
    fn test_from_json_numeric_string_event_id() {
        let line = r#"{"source": "Net", "event_id": "42", "message": "x"}"#;
        let record = LogRecord::from_json(line).unwrap();
        assert_eq!(record.event_id, Some(42));
    }

    #[test]
    fn test_from_json_malformed_fields_are_tolerated() {
        let line = r#"{"timestamp": "yesterday", "event_id": "not-a-number", "severity": "weird", "message": null}"#;
        let record = LogRecord::from_json(line).unwrap();

        assert_eq!(record.source, None);
        assert_eq!(record.event_id, None);
        assert_eq!(record.severity, Severity::Error);
        assert_eq!(record.message, "");
        assert_eq!(record.timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_from_json_out_of_range_event_id() {
        let line = r#"{"source": "Net", "event_id": 99999999999, "message": "x"}"#;
        let record = LogRecord::from_json(line).unwrap();
        assert_eq!(record.event_id, None);

        let negative = r#"{"source": "Net", "event_id": -1, "message": "x"}"#;
        assert_eq!(LogRecord::from_json(negative).unwrap().event_id, None);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(LogRecord::from_json("not json").is_err());
        assert!(LogRecord::from_json("[]").is_err());
        assert!(LogRecord::from_json("null").is_err());
        assert!(LogRecord::from_json("").is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_severity_error_class() {
        assert!(Severity::Critical.is_error_class());
        assert!(Severity::Error.is_error_class());
        assert!(!Severity::Warning.is_error_class());
        assert!(!Severity::Info.is_error_class());
        assert!(!Severity::Debug.is_error_class());
    }

    #[test]
    fn test_severity_from_syslog_priority() {
        assert_eq!(Severity::from_syslog_priority(0), Severity::Critical);
        assert_eq!(Severity::from_syslog_priority(2), Severity::Critical);
        assert_eq!(Severity::from_syslog_priority(3), Severity::Error);
        assert_eq!(Severity::from_syslog_priority(4), Severity::Warning);
        assert_eq!(Severity::from_syslog_priority(6), Severity::Info);
        assert_eq!(Severity::from_syslog_priority(7), Severity::Debug);
    }

    #[test]
    fn test_severity_serialization() {
        assert_eq!(
            serde_json::to_string(&Severity::Error).unwrap(),
            "\"error\""
        );
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(Severity::parse("FAULT"), Some(Severity::Critical));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("bogus"), None);
    }
}
