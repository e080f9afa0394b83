/// JSON and CSV writers for run artifacts
pub mod exporter;

pub use exporter::{save_error_records, save_recurring_errors};
