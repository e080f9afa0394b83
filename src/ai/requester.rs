use crate::aggregator::ErrorGroup;
use crate::ai::backends::{
    LLMBackend, MockBackend, OllamaBackend, OpenAICompatibleBackend, OLLAMA_BASE_URL,
    OPENAI_BASE_URL, XAI_BASE_URL,
};
use crate::ai::prompt::Prompt;
use crate::config::LlmConfig;
use crate::error::SuggestionError;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Instant;

/// Prefix of every rendered failure; display code keys its styling off it
pub const ERROR_MARKER: &str = "Error:";

/// Returned without contacting the backend when there is nothing to send
pub const NOTHING_TO_ANALYZE: &str = "No recurring errors were provided, so there is nothing to analyze.";

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Grok,
    OpenAI,
    Ollama,
    Mock,
}

impl Provider {
    /// Parse a provider name, case-insensitively
    pub fn parse(name: &str) -> Result<Self, SuggestionError> {
        match name.trim().to_lowercase().as_str() {
            "grok" | "xai" | "x.ai" => Ok(Provider::Grok),
            "openai" => Ok(Provider::OpenAI),
            "ollama" => Ok(Provider::Ollama),
            "mock" => Ok(Provider::Mock),
            _ => Err(SuggestionError::UnsupportedProvider(name.to_string())),
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Grok => XAI_BASE_URL,
            Provider::OpenAI => OPENAI_BASE_URL,
            Provider::Ollama => OLLAMA_BASE_URL,
            Provider::Mock => "mock",
        }
    }

    /// Model used when the configuration names none
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Grok => "grok-3-mini-beta",
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Ollama => "llama3",
            Provider::Mock => "mock",
        }
    }

    fn requires_api_key(self) -> bool {
        matches!(self, Provider::Grok | Provider::OpenAI)
    }
}

/// Outcome of a suggestion request
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    Text(String),
    Failed(SuggestionError),
}

impl Suggestion {
    pub fn is_failure(&self) -> bool {
        matches!(self, Suggestion::Failed(_))
    }

    /// Text shown to the user; failures start with `ERROR_MARKER`
    pub fn render(&self) -> String {
        match self {
            Suggestion::Text(text) => text.clone(),
            Suggestion::Failed(e) => format!("{} {}", ERROR_MARKER, e),
        }
    }
}

/// Sends ranked error groups to an LLM backend and returns its advice
///
/// Configuration problems (unknown provider, missing API key) are held until
/// the first request and reported as a failed suggestion, so they surface in
/// the same place as network failures.
pub struct SuggestionRequester {
    backend: Result<Arc<dyn LLMBackend>, SuggestionError>,
    language: String,
}

impl SuggestionRequester {
    /// Create a requester around an existing backend
    pub fn with_backend(backend: Arc<dyn LLMBackend>, language: &str) -> Self {
        Self {
            backend: Ok(backend),
            language: language.to_string(),
        }
    }

    /// Build the backend described by the configuration
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            backend: build_backend(config),
            language: config.response_language.clone(),
        }
    }

    /// Request troubleshooting suggestions for the given groups
    ///
    /// Exactly one backend call is made for a non-empty group list; an empty
    /// list returns `NOTHING_TO_ANALYZE` without any request.
    pub async fn request(&self, groups: &[ErrorGroup]) -> Suggestion {
        if groups.is_empty() {
            info!("No error groups to send for suggestions");
            return Suggestion::Text(NOTHING_TO_ANALYZE.to_string());
        }

        let backend = match &self.backend {
            Ok(backend) => backend,
            Err(e) => {
                error!("LLM backend is not usable: {}", e);
                return Suggestion::Failed(e.clone());
            }
        };

        let prompt = Prompt::new(groups, &self.language);
        info!(
            "Requesting suggestions for {} error groups from {}",
            groups.len(),
            backend.name()
        );
        debug!("Prompt:\n{}", prompt.user);

        let start_time = Instant::now();
        let result = backend.suggest(&prompt).await;
        let duration = start_time.elapsed();

        match result {
            Ok(text) => {
                info!(
                    "Received suggestions in {:?} ({} chars)",
                    duration,
                    text.len()
                );
                Suggestion::Text(text)
            }
            Err(e) => {
                match &e {
                    SuggestionError::Timeout(secs) => {
                        error!("LLM API request timed out ({} seconds)", secs)
                    }
                    SuggestionError::HttpStatus { status, body } => {
                        error!("LLM API HTTP error {}: {}", status, body)
                    }
                    SuggestionError::Transport(reason) => {
                        error!("Network error during LLM API request: {}", reason)
                    }
                    other => error!("LLM request failed after {:?}: {}", duration, other),
                }
                Suggestion::Failed(e)
            }
        }
    }
}

fn build_backend(config: &LlmConfig) -> Result<Arc<dyn LLMBackend>, SuggestionError> {
    let provider = Provider::parse(&config.provider)?;
    let base_url = config
        .endpoint
        .clone()
        .unwrap_or_else(|| provider.default_base_url().to_string());

    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !is_placeholder_key(key))
        .map(str::to_string);
    if provider.requires_api_key() && api_key.is_none() {
        return Err(SuggestionError::MissingApiKey);
    }
    let api_key = api_key.unwrap_or_default();

    let timeout = config.timeout();
    let model = model_for(config, provider);
    debug!(
        "Using {:?} provider at {} (model: {}, timeout: {}s)",
        provider, base_url, model, config.request_timeout_secs
    );

    let backend: Arc<dyn LLMBackend> = match provider {
        Provider::Grok | Provider::OpenAI => Arc::new(OpenAICompatibleBackend::with_base_url(
            api_key,
            model,
            base_url,
            timeout,
        )?),
        Provider::Ollama => Arc::new(OllamaBackend::new(base_url, model, timeout)?),
        Provider::Mock => Arc::new(MockBackend::success()),
    };
    Ok(backend)
}

/// Configured model, or the provider's default when none is set
fn model_for(config: &LlmConfig, provider: Provider) -> String {
    config
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| provider.default_model())
        .to_string()
}

/// Empty keys and template values such as `YOUR_GROK_API_KEY_HERE`
fn is_placeholder_key(key: &str) -> bool {
    key.is_empty() || key.starts_with("YOUR_")
}
