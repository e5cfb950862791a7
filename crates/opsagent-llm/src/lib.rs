//! LLM provider abstraction (C5) and conversation state (C6).
//!
//! One normalized [`provider::LlmProvider`] trait; one module per
//! vendor doing bidirectional conversion at its own boundary; a
//! [`router::ProviderRouter`] resolving and memoizing instances from
//! configuration.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod claude;
mod conversation;
mod error;
mod gemini;
mod normalize;
mod openai_compat;
mod provider;
mod router;
mod types;

pub use claude::ClaudeProvider;
pub use conversation::{Conversation, DEFAULT_SYSTEM_PROMPT};
pub use error::{LlmError, LlmResult};
pub use gemini::GeminiProvider;
pub use normalize::{normalize_arguments, normalize_value};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, ProviderHttpConfig, StreamBox};
pub use router::ProviderRouter;
pub use types::{
    Message, NeutralToolDefinition, ProviderResponse, StopReason, StreamEvent, ToolCall,
    ToolResultBlock, Usage,
};
