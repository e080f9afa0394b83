/// LLM suggestion requests for recurring errors
pub mod backends;
pub mod prompt;
pub mod requester;

pub use backends::{LLMBackend, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use prompt::{format_prompt, Prompt};
pub use requester::{Provider, Suggestion, SuggestionRequester, ERROR_MARKER, NOTHING_TO_ANALYZE};
