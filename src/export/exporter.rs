use crate::aggregator::ErrorGroup;
use crate::error::ExportError;
use crate::events::{LogRecord, TIMESTAMP_FORMAT};
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column order of the error record CSV
pub const CSV_HEADER: [&str; 5] = ["Timestamp", "Source", "EventID", "Severity", "Message"];

/// Write the ranked error groups as a pretty-printed JSON array
///
/// An empty group list is a no-op and returns `Ok(None)`.
///
/// # Errors
///
/// Returns `ExportError` if the directory or file cannot be written.
pub fn save_recurring_errors(
    groups: &[ErrorGroup],
    path: &Path,
) -> Result<Option<PathBuf>, ExportError> {
    if groups.is_empty() {
        warn!("No recurring error details provided to save");
        return Ok(None);
    }

    info!("Saving recurring error details to '{}'", path.display());
    let json = serde_json::to_string_pretty(groups)?;
    write_file(path, json.as_bytes())?;
    info!("Successfully saved recurring errors to '{}'", path.display());
    Ok(Some(path.to_path_buf()))
}

/// Write the raw error records as CSV with every field quoted
///
/// An empty record list is a no-op and returns `Ok(None)`.
///
/// # Errors
///
/// Returns `ExportError` if the directory or file cannot be written.
pub fn save_error_records(
    records: &[LogRecord],
    path: &Path,
) -> Result<Option<PathBuf>, ExportError> {
    if records.is_empty() {
        warn!("No critical logs found to save");
        return Ok(None);
    }

    info!("Saving {} critical logs to '{}'", records.len(), path.display());
    let mut csv = csv_row(CSV_HEADER.iter().copied());
    for record in records {
        let timestamp = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let event_id = record.event_id.map(|id| id.to_string()).unwrap_or_default();
        csv.push_str(&csv_row([
            timestamp.as_str(),
            record.source.as_deref().unwrap_or_default(),
            event_id.as_str(),
            record.severity.label(),
            record.message.as_str(),
        ]));
    }

    write_file(path, csv.as_bytes())?;
    info!("Successfully saved critical logs to '{}'", path.display());
    Ok(Some(path.to_path_buf()))
}

/// One CSV line with all fields quoted and inner quotes doubled
fn csv_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = fields
        .into_iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect();
    format!("{}\r\n", quoted.join(","))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    let io_error = |source: std::io::Error| ExportError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut file = fs::File::create(path).map_err(io_error)?;
    file.write_all(contents).map_err(io_error)?;
    file.flush().map_err(io_error)
}
