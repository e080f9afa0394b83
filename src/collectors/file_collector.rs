use crate::collectors::LogSource;
use crate::error::CollectorError;
use crate::events::LogRecord;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Upper bound on memory reserved up front for the record window
const PREALLOCATE_LIMIT: usize = 1024;

/// Sliding window holding the newest `capacity` records pushed into it
struct RecentRecords {
    records: VecDeque<LogRecord>,
    capacity: usize,
    evicted: usize,
}

impl RecentRecords {
    fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
            capacity,
            evicted: 0,
        }
    }

    fn push(&mut self, record: LogRecord) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
            self.evicted += 1;
        }
        self.records.push_back(record);
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn into_vec(self) -> Vec<LogRecord> {
        self.records.into()
    }
}

/// Reads error-class records from a JSON-lines export file
///
/// Each non-empty line is decoded with `LogRecord::from_json`. Malformed lines
/// are skipped so that one bad entry never halts the read. When the file holds
/// more error records than requested, the most recent ones are kept.
pub struct FileCollector {
    path: PathBuf,
}

impl FileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines<R: BufRead>(reader: R, max_records: usize) -> Result<Vec<LogRecord>, CollectorError> {
        let mut records = RecentRecords::new(max_records);
        let mut processed = 0usize;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            processed += 1;

            match LogRecord::from_json(&line) {
                Ok(record) if record.severity.is_error_class() => records.push(record),
                Ok(_) => {}
                Err(e) => debug!("Failed to parse log entry '{}': {}", line, e),
            }
        }

        if records.evicted > 0 {
            info!(
                "Reached max_records limit ({}), dropped {} older records",
                max_records, records.evicted
            );
        }

        debug!("Processed {} lines, kept {} error records", processed, records.len());
        Ok(records.into_vec())
    }
}

impl LogSource for FileCollector {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn read_errors(&self, max_records: usize) -> Result<Vec<LogRecord>, CollectorError> {
        let file = File::open(&self.path).map_err(|e| {
            warn!("Cannot open log file '{}': {}", self.path.display(), e);
            CollectorError::IoError(e)
        })?;

        let records = Self::read_lines(BufReader::new(file), max_records)?;
        info!(
            "Finished reading '{}'. Found {} error events",
            self.name(),
            records.len()
        );
        Ok(records)
    }
}
