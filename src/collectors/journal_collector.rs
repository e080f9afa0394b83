use crate::collectors::LogSource;
use crate::error::CollectorError;
use crate::events::{lenient_event_id, lenient_string, LogRecord, Severity};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::process::{Command, Stdio};

/// Reads error-class entries from the systemd journal
///
/// Runs `journalctl` once in JSON output mode, newest entries first, and
/// converts each line into a `LogRecord`. Entries that cannot be parsed are
/// logged and skipped.
pub struct JournalCollector {
    /// Restrict the query to a single systemd unit
    unit: Option<String>,
}

impl JournalCollector {
    /// Create a collector for the whole system journal
    pub fn new() -> Self {
        Self { unit: None }
    }

    /// Create a collector restricted to one systemd unit
    ///
    /// # Example
    ///
    /// ```
    /// use logsage::collectors::JournalCollector;
    ///
    /// let collector = JournalCollector::for_unit("sshd.service");
    /// ```
    pub fn for_unit(unit: &str) -> Self {
        Self {
            unit: Some(unit.to_string()),
        }
    }

    /// Arguments passed to `journalctl`
    fn journalctl_args(&self, max_records: usize) -> Vec<String> {
        let mut args = vec![
            "--priority=err".to_string(),
            "--output=json".to_string(),
            "--no-pager".to_string(),
            "--reverse".to_string(),
            format!("--lines={}", max_records),
        ];
        if let Some(ref unit) = self.unit {
            args.push(format!("--unit={}", unit));
        }
        args
    }

    /// Convert journalctl JSON output into records, oldest first
    fn parse_output(output: &str, max_records: usize) -> Vec<LogRecord> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for line in output.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if records.len() >= max_records {
                info!("Reached max_records limit ({}) for journal", max_records);
                break;
            }

            match parse_journal_entry(line) {
                Ok(record) if record.severity.is_error_class() => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    skipped += 1;
                    debug!("Failed to parse journal entry '{}': {}", line, e);
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} unparseable journal entries", skipped);
        }

        // journalctl was asked for newest-first; the aggregator expects input order
        records.reverse();
        records
    }
}

impl Default for JournalCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSource for JournalCollector {
    fn name(&self) -> String {
        match self.unit {
            Some(ref unit) => format!("journal:{}", unit),
            None => "journal".to_string(),
        }
    }

    fn read_errors(&self, max_records: usize) -> Result<Vec<LogRecord>, CollectorError> {
        let args = self.journalctl_args(max_records);
        debug!("Running journalctl {}", args.join(" "));

        let output = Command::new("journalctl")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CollectorError::SubprocessSpawn(format!("journalctl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::SubprocessFailed(format!(
                "journalctl exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = Self::parse_output(&stdout, max_records);
        info!(
            "Finished reading '{}'. Found {} error events",
            self.name(),
            records.len()
        );
        Ok(records)
    }
}

/// Convert one line of `journalctl --output=json` into a record
///
/// # Errors
///
/// Returns `CollectorError::ParseError` if the line is not a JSON object.
pub fn parse_journal_entry(line: &str) -> Result<LogRecord, CollectorError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| CollectorError::ParseError(e.to_string()))?;
    let entry = value
        .as_object()
        .ok_or_else(|| CollectorError::ParseError("expected a JSON object".to_string()))?;

    let timestamp = entry
        .get("__REALTIME_TIMESTAMP")
        .and_then(lenient_string)
        .and_then(|micros| micros.parse::<i64>().ok())
        .and_then(|micros| Utc.timestamp_micros(micros).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let source = entry
        .get("SYSLOG_IDENTIFIER")
        .or_else(|| entry.get("_COMM"))
        .and_then(lenient_string);

    let event_id = entry.get("ERRNO").and_then(lenient_event_id);

    let severity = entry
        .get("PRIORITY")
        .and_then(lenient_string)
        .and_then(|p| p.parse::<u8>().ok())
        .map(Severity::from_syslog_priority)
        .unwrap_or(Severity::Error);

    let message = entry
        .get("MESSAGE")
        .map(journal_message)
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(LogRecord {
        timestamp,
        source,
        event_id,
        severity,
        message,
    })
}

/// Journal messages are strings, or byte arrays when they are not valid UTF-8
fn journal_message(value: &Value) -> String {
    match value {
        Value::Array(bytes) => {
            let raw: Vec<u8> = bytes
                .iter()
                .filter_map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            String::from_utf8_lossy(&raw).into_owned()
        }
        other => lenient_string(other).unwrap_or_default(),
    }
}
