//! Log source collaborators
//!
//! Each source yields error-class `LogRecord`s, capped per source. Sources are
//! named by spec strings: `journal`, `journal:<unit>` or `file:<path>`.

/// systemd journal reader
pub mod journal_collector;

/// JSON-lines export file reader
pub mod file_collector;

pub use file_collector::FileCollector;
pub use journal_collector::JournalCollector;

use crate::error::CollectorError;
use crate::events::LogRecord;
use log::{error, info};
use std::fmt;
use std::path::PathBuf;

/// A place error records can be read from
#[cfg_attr(test, mockall::automock)]
pub trait LogSource {
    /// Human-readable name used in log output
    fn name(&self) -> String;

    /// Read at most `max_records` error-class records, oldest first
    fn read_errors(&self, max_records: usize) -> Result<Vec<LogRecord>, CollectorError>;
}

/// Parsed form of a log source spec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// The systemd journal, optionally restricted to one unit
    Journal { unit: Option<String> },
    /// A JSON-lines file of records
    File(PathBuf),
}

impl SourceSpec {
    /// Parse a source spec string
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::InvalidSource` for unknown kinds or empty arguments.
    pub fn parse(spec: &str) -> Result<Self, CollectorError> {
        let spec = spec.trim();
        let (kind, arg) = match spec.split_once(':') {
            Some((kind, arg)) => (kind.trim(), Some(arg.trim())),
            None => (spec, None),
        };

        match (kind.to_lowercase().as_str(), arg) {
            ("journal", None) => Ok(SourceSpec::Journal { unit: None }),
            ("journal", Some(unit)) if !unit.is_empty() => Ok(SourceSpec::Journal {
                unit: Some(unit.to_string()),
            }),
            ("file", Some(path)) if !path.is_empty() => Ok(SourceSpec::File(PathBuf::from(path))),
            _ => Err(CollectorError::InvalidSource(spec.to_string())),
        }
    }

    /// Build the collector for this spec
    pub fn into_source(self) -> Box<dyn LogSource> {
        match self {
            SourceSpec::Journal { unit: None } => Box::new(JournalCollector::new()),
            SourceSpec::Journal { unit: Some(unit) } => Box::new(JournalCollector::for_unit(&unit)),
            SourceSpec::File(path) => Box::new(FileCollector::new(path)),
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Journal { unit: None } => write!(f, "journal"),
            SourceSpec::Journal { unit: Some(unit) } => write!(f, "journal:{}", unit),
            SourceSpec::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Read every source in turn, skipping sources that fail
///
/// Records are concatenated in source order. A failing source is logged and
/// does not prevent the remaining sources from being read.
pub fn read_all(sources: &[Box<dyn LogSource>], max_records: usize) -> Vec<LogRecord> {
    let mut all_errors = Vec::new();

    for source in sources {
        info!(
            "Reading up to {} recent error events from '{}'",
            max_records,
            source.name()
        );
        match source.read_errors(max_records) {
            Ok(records) => all_errors.extend(records),
            Err(e) => error!("Failed to read '{}': {}", source.name(), e),
        }
    }

    info!("Total critical/error events collected: {}", all_errors.len());
    all_errors
}
