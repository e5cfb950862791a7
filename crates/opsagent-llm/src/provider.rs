//! The provider trait every vendor module implements (C5).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::LlmResult;
use crate::types::{Message, NeutralToolDefinition, ProviderResponse, StreamEvent};

/// A boxed stream of streaming response frames.
pub type StreamBox = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// Resolved, vendor-agnostic HTTP configuration for a provider
/// instance: the API key (already read from its configured
/// environment variable), model, and sampling parameters.
#[derive(Clone)]
pub struct ProviderHttpConfig {
    /// API key, resolved from the environment variable the app
    /// configuration names for this provider.
    pub api_key: String,
    /// Model identifier passed to the vendor API.
    pub model: String,
    /// Maximum tokens requested per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Override for the vendor's default API base URL, for testing
    /// against a local stand-in.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderHttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHttpConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// A chat-model back end exposing the normalized interface the agent
/// loop consumes.
///
/// Implementors own both directions of conversion between the neutral
/// types in [`crate::types`] and their vendor's wire format; nothing
/// outside the module should need vendor-specific knowledge. Adding a
/// new vendor is a single self-contained module plus a
/// [`crate::router::ProviderRouter`] entry.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name (`"claude"`, `"gemini"`, `"openai_compat"`, ...).
    fn name(&self) -> &str;

    /// Model identifier this instance is configured for.
    fn model(&self) -> &str;

    /// Whether this provider can be handed a non-empty tool catalog at
    /// all. All three reference vendors support tool use; the field
    /// exists for providers that cannot.
    fn supports_tool_use(&self) -> bool {
        true
    }

    /// Sends `messages` (plus the fixed system instruction, injected
    /// through whichever native channel the vendor offers) and `tools`,
    /// and returns the complete, normalized response.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[NeutralToolDefinition],
    ) -> LlmResult<ProviderResponse>;

    /// Streams text output. Returns
    /// [`crate::error::LlmError::StreamingWithToolsUnsupported`] when
    /// `tools` is non-empty: tool-use-during-stream is not supported by
    /// this core, matching the originating design's explicit
    /// non-goal — callers that need tools must use [`Self::chat`]
    /// instead, which is the agent loop's only call path.
    async fn stream_chat(
        &self,
        messages: &[Message],
        tools: &[NeutralToolDefinition],
    ) -> LlmResult<StreamBox>;
}
