//! Language model capability.
//!
//! The proof workflow only ever needs one operation from a language model:
//! send a prompt, get text back. [`LanguageModel`] captures exactly that so the
//! workflow can run against the hosted chat API in production and against a
//! scripted stub in tests.

pub mod chat;
pub mod scripted;

use async_trait::async_trait;
use thiserror::Error;

pub use chat::{ChatCompletionClient, ChatConfig};
pub use scripted::ScriptedModel;

/// Errors that can occur while calling a language model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The API answered with HTTP 429
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The API answered with a non-success status
    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// Connection, timeout or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Missing or invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for language model calls.
pub type LlmResult<T> = Result<T, LlmError>;

/// A text-completion capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` as a single user message and return the model's text.
    async fn complete(&self, prompt: &str) -> LlmResult<String>;

    /// Identifier of the underlying model, for logging.
    fn model_name(&self) -> &str;
}
