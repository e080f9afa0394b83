use thiserror::Error;

/// Errors that can occur while reading log sources
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to spawn subprocess: {0}")]
    SubprocessSpawn(String),

    #[error("Subprocess failed: {0}")]
    SubprocessFailed(String),

    #[error("Failed to parse log entry: {0}")]
    ParseError(String),

    #[error("Invalid log source '{0}'")]
    InvalidSource(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised inside the recurring-error aggregator
///
/// These never leave the aggregator; they are converted into a degraded result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Occurrence count overflowed for {source_name}/{event_id}")]
    CountOverflow { source_name: String, event_id: u32 },
}

/// Errors that can occur while writing result artifacts
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur while requesting troubleshooting suggestions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuggestionError {
    #[error("Unsupported LLM provider '{0}'. Supported: grok, xai, x.ai, openai, ollama, mock")]
    UnsupportedProvider(String),

    #[error("API key is not configured (set LLM_API_KEY or GROK_API_KEY)")]
    MissingApiKey,

    #[error("LLM API request timed out after {0} seconds")]
    Timeout(u64),

    #[error("LLM API request failed with HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Network error during LLM API request: {0}")]
    Transport(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
