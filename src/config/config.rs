//! Application configuration
//!
//! A `Config` is built once at startup from defaults, an optional TOML file and
//! environment variables, then passed down explicitly. Nothing below `main`
//! reads the process environment.

use crate::ai::Provider;
use crate::collectors::SourceSpec;
use crate::error::ConfigError;
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PROVIDER: &str = "grok";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_MAX_EVENTS: usize = 2000;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_OUTPUT_DIR: &str = "logs";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FILE_MAX_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_LOG_FILE_BACKUP_COUNT: usize = 3;

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

/// What to read and how much to report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Log source specs (`journal`, `journal:<unit>`, `file:<path>`)
    pub sources: Vec<String>,
    /// Maximum error records read per source
    pub max_events: usize,
    /// Number of ranked groups to report
    pub top_n: usize,
    /// Directory receiving exported artifacts and the log file
    pub output_dir: PathBuf,
}

/// Suggestion request settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key: Option<String>,
    /// Model name; the provider's default when unset
    pub model: Option<String>,
    /// Overrides the provider's default base URL
    pub endpoint: Option<String>,
    pub request_timeout_secs: u64,
    /// Language the suggestions must be written in
    pub response_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`
    pub level: String,
    /// Log file name, created inside the output directory
    pub file: Option<String>,
    /// Size at which the log file is rotated
    pub file_max_bytes: usize,
    /// Rotated log files kept next to the active one
    pub file_backup_count: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sources: vec!["journal".to_string()],
            max_events: DEFAULT_MAX_EVENTS,
            top_n: DEFAULT_TOP_N,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_key: None,
            model: None,
            endpoint: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            response_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
            file_max_bytes: DEFAULT_LOG_FILE_MAX_BYTES,
            file_backup_count: DEFAULT_LOG_FILE_BACKUP_COUNT,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LoggingConfig {
    /// Parsed level filter, `Info` for unknown names
    pub fn level_filter(&self) -> LevelFilter {
        normalize_log_level(&self.level)
            .and_then(|level| LevelFilter::from_str(&level).ok())
            .unwrap_or(LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and keys take their defaults; zero-valued numeric
    /// settings are replaced by their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read and
    /// `ConfigError::TomlError` if it is not valid TOML for this schema.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let mut config: Config = toml::from_str(&contents)?;
        config.sanitize();
        Ok(config)
    }

    /// Load configuration from an optional file, falling back to defaults
    ///
    /// A missing, unreadable or invalid file is reported and never aborts.
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::from_file(path) {
                Ok(config) => config,
                Err(ConfigError::ReadError(e)) => {
                    warn!("Configuration file not found or unreadable ({}), using defaults", e);
                    Self::default()
                }
                Err(e) => {
                    warn!(
                        "Configuration error in '{}': {}. Using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// Override settings from environment-style variables
    ///
    /// Takes the variables explicitly so callers decide where they come from.
    /// Invalid numeric values are reported and leave the current value in place.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();
        let get = |name: &str| vars.get(name).map(|v| v.trim().to_string());

        if let Some(provider) = get("LLM_PROVIDER") {
            self.llm.provider = provider.to_lowercase();
        }
        if let Some(key) = get("LLM_API_KEY").or_else(|| get("GROK_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = Some(model);
        } else if let Some(model) = get("GROK_MODEL") {
            if matches!(Provider::parse(&self.llm.provider), Ok(Provider::Grok)) {
                self.llm.model = Some(model);
            } else {
                warn!("Ignoring GROK_MODEL for provider '{}'", self.llm.provider);
            }
        }
        if let Some(endpoint) = get("LLM_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(language) = get("LLM_RESPONSE_LANGUAGE") {
            self.llm.response_language = language;
        }
        if let Some(raw) = get("LLM_REQUEST_TIMEOUT") {
            self.llm.request_timeout_secs =
                parse_positive("LLM_REQUEST_TIMEOUT", &raw, self.llm.request_timeout_secs);
        }

        if let Some(names) = get("ANALYSIS_LOG_NAMES") {
            let sources: Vec<String> = names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            if !sources.is_empty() {
                self.analysis.sources = sources;
            }
        }
        if let Some(raw) = get("ANALYSIS_MAX_EVENTS_TO_READ") {
            self.analysis.max_events =
                parse_positive("ANALYSIS_MAX_EVENTS_TO_READ", &raw, self.analysis.max_events);
        }
        if let Some(raw) = get("ANALYSIS_TOP_RECURRING_ERRORS") {
            self.analysis.top_n =
                parse_positive("ANALYSIS_TOP_RECURRING_ERRORS", &raw, self.analysis.top_n);
        }
        if let Some(dir) = get("ANALYSIS_LOG_OUTPUT_DIR") {
            self.analysis.output_dir = PathBuf::from(dir);
        }

        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = get("LOG_FILENAME") {
            self.logging.file = Some(file);
        }
        if let Some(raw) = get("LOG_FILE_MAX_BYTES") {
            self.logging.file_max_bytes =
                parse_positive("LOG_FILE_MAX_BYTES", &raw, self.logging.file_max_bytes);
        }
        if let Some(raw) = get("LOG_FILE_BACKUP_COUNT") {
            self.logging.file_backup_count =
                parse_positive("LOG_FILE_BACKUP_COUNT", &raw, self.logging.file_backup_count);
        }

        self.sanitize();
    }

    /// Parsed log sources; invalid specs are reported and skipped
    pub fn source_specs(&self) -> Vec<SourceSpec> {
        self.analysis
            .sources
            .iter()
            .filter_map(|spec| match SourceSpec::parse(spec) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    warn!("Skipping log source: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Path of the log file, if file logging is enabled
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.logging
            .file
            .as_ref()
            .map(|file| self.analysis.output_dir.join(file))
    }

    /// Replace zero-valued numeric settings and unknown log levels with
    /// their defaults
    fn sanitize(&mut self) {
        match normalize_log_level(&self.logging.level) {
            Some(level) => self.logging.level = level,
            None => {
                warn!(
                    "Invalid log level '{}', using {}",
                    self.logging.level, DEFAULT_LOG_LEVEL
                );
                self.logging.level = DEFAULT_LOG_LEVEL.to_string();
            }
        }
        if self.logging.file_max_bytes == 0 {
            warn!(
                "file_max_bytes must be positive, using {}",
                DEFAULT_LOG_FILE_MAX_BYTES
            );
            self.logging.file_max_bytes = DEFAULT_LOG_FILE_MAX_BYTES;
        }
        if self.logging.file_backup_count == 0 {
            warn!(
                "file_backup_count must be positive, using {}",
                DEFAULT_LOG_FILE_BACKUP_COUNT
            );
            self.logging.file_backup_count = DEFAULT_LOG_FILE_BACKUP_COUNT;
        }
        if self.analysis.max_events == 0 {
            warn!("max_events must be positive, using {}", DEFAULT_MAX_EVENTS);
            self.analysis.max_events = DEFAULT_MAX_EVENTS;
        }
        if self.analysis.top_n == 0 {
            warn!("top_n must be positive, using {}", DEFAULT_TOP_N);
            self.analysis.top_n = DEFAULT_TOP_N;
        }
        if self.llm.request_timeout_secs == 0 {
            warn!(
                "request_timeout_secs must be positive, using {}",
                DEFAULT_TIMEOUT_SECS
            );
            self.llm.request_timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
    }
}

/// Lowercased level name accepted by `log`, or `None` for unknown names
///
/// `warning` and `critical` are accepted as aliases of `warn` and `error`.
fn normalize_log_level(raw: &str) -> Option<String> {
    let level = match raw.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        other => other.to_string(),
    };
    LevelFilter::from_str(&level).ok().map(|_| level)
}

/// Parse a positive number, keeping `fallback` for anything else
fn parse_positive<T>(name: &str, raw: &str, fallback: T) -> T
where
    T: FromStr + PartialOrd + Default + std::fmt::Display + Copy,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!("Invalid {} value '{}', using {}", name, raw, fallback);
            fallback
        }
    }
}
