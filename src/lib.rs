/// Error types for every pipeline boundary
pub mod error;

/// Log record model
pub mod events;

/// Log sources: systemd journal and JSON-lines files
pub mod collectors;

/// Recurring-error grouping and ranking
pub mod aggregator;

/// JSON and CSV artifact writers
pub mod export;

/// LLM prompt, backends and suggestion requests
pub mod ai;

/// Configuration management
pub mod config;

/// Console and rotating file log targets
pub mod logging;

/// Console status panels
pub mod display;

/// End-to-end analysis run
pub mod orchestrator;

// Re-export commonly used types
pub use aggregator::{aggregate, ErrorGroup, RecurringErrors};
pub use error::{AggregationError, CollectorError, ConfigError, ExportError, SuggestionError};
pub use events::{LogRecord, Severity};
