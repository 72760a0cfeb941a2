//! Provider abstraction layer
//!
//! The executor depends on one capability: stream a prompt through a model
//! and receive an ordered sequence of text deltas. Everything else about an
//! LLM backend stays behind the [`Provider`] trait.
//!
//! Model strings are written `"provider/model"` (e.g.
//! `"anthropic/claude-sonnet-4-5"`); [`split_model`] maps them to a
//! provider name and a concrete model id.

mod claude;
mod mock;
mod openai;

pub use claude::ClaudeProvider;
pub use mock::MockProvider;
pub use openai::OpenAIProvider;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Default models per provider
pub const CLAUDE_DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

/// Process-wide default model spec, overridable via `FOLIO_MODEL`
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4-5";

/// One unit of streamed output
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A text delta; concatenating deltas in order yields the response
    Delta(String),
    /// Stream finished normally
    Done,
}

/// A prompt ready to stream
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    /// The full accumulated context, already joined
    pub prompt: String,
    /// Optional system prompt
    pub system: Option<String>,
    /// Concrete model id (provider prefix already stripped)
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
}

impl StreamRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), model: model.into(), ..Default::default() }
    }
}

/// LLM provider abstraction
///
/// Implementations:
/// - [`ClaudeProvider`]: Anthropic Messages API (SSE streaming)
/// - [`OpenAIProvider`]: OpenAI chat completions (SSE streaming)
/// - [`MockProvider`]: queued responses for tests
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (e.g., "anthropic", "openai", "mock")
    fn name(&self) -> &str;

    /// Default model for this provider
    fn default_model(&self) -> &str;

    /// Stream a request, sending each text delta to `chunks` as it
    /// arrives, and return the full concatenated response
    async fn stream(
        &self,
        request: StreamRequest,
        chunks: mpsc::Sender<StreamChunk>,
    ) -> Result<String>;
}

/// Create a provider by name
pub fn create_provider(name: &str) -> Result<Box<dyn Provider>> {
    if name.eq_ignore_ascii_case("anthropic") || name.eq_ignore_ascii_case("claude") {
        Ok(Box::new(ClaudeProvider::new()?))
    } else if name.eq_ignore_ascii_case("openai") {
        Ok(Box::new(OpenAIProvider::new()?))
    } else if name.eq_ignore_ascii_case("mock") {
        Ok(Box::new(MockProvider::new()))
    } else {
        anyhow::bail!("Unknown provider: '{}'. Available: anthropic, openai, mock", name)
    }
}

/// Split a `"provider/model"` spec; a bare model defaults to anthropic
pub fn split_model(spec: &str) -> (&str, &str) {
    match spec.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => (provider, model),
        _ => ("anthropic", spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_model_handles_prefixed_and_bare() {
        assert_eq!(
            split_model("anthropic/claude-sonnet-4-5"),
            ("anthropic", "claude-sonnet-4-5")
        );
        assert_eq!(split_model("openai/gpt-4o"), ("openai", "gpt-4o"));
        assert_eq!(split_model("claude-sonnet-4-5"), ("anthropic", "claude-sonnet-4-5"));
    }

    #[test]
    fn create_provider_mock() {
        let provider = create_provider("mock").unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn create_provider_unknown() {
        assert!(create_provider("nonsense").is_err());
    }
}
