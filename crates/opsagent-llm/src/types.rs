//! The provider-neutral message log and response shapes (C5/C6).
//!
//! Every vendor module converts to and from these types at its own
//! boundary; nothing outside `opsagent-llm` should need to know which
//! vendor produced a [`ProviderResponse`].

use opsagent_tools::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A model-emitted request to invoke a tool with arguments.
///
/// `id` is minted by the provider; the core treats it as an opaque
/// token and echoes it back on the matching [`ToolResultBlock`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-minted call id, echoed on the matching tool result.
    pub id: String,
    /// Tool name, matched against the registry.
    pub name: String,
    /// Arguments, already normalized to plain JSON by the vendor module
    /// that produced this call (see [`crate::normalize::normalize_value`]
    /// for the recursive strategy vendors with non-JSON argument shapes
    /// must apply before constructing this).
    pub arguments: Value,
}

impl ToolCall {
    /// Builds a tool call with the given id, name, and arguments.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One `{tool_use_id, content}` block in a `tool_result` message.
///
/// A single model turn may emit several tool calls; the agent loop
/// executes each and appends one block per call, in the order the
/// model emitted them, as a single batch message (§4.7 of the
/// originating design).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// The [`ToolCall::id`] this block answers.
    pub tool_call_id: String,
    /// Plain-text content for conversation replay, produced by the
    /// tool executor's result-selection rule.
    pub content: String,
    /// Whether this block represents a tool error, surfaced to
    /// vendors that distinguish error tool results from success ones.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultBlock {
    /// Builds a successful tool-result block.
    #[must_use]
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Builds an error tool-result block.
    #[must_use]
    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// An entry in conversation order.
///
/// `System` appears exactly once, at position 0 (enforced by
/// [`crate::conversation::Conversation`], not by this type itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// The fixed system instruction.
    System {
        /// Instruction text.
        content: String,
    },
    /// A user turn.
    User {
        /// Message text.
        content: String,
    },
    /// An assistant turn: free text, tool calls, or both. A turn that
    /// emits tool calls may still carry accompanying text (e.g. "Let me
    /// check that.").
    Assistant {
        /// Free text, absent when the turn is tool-calls-only.
        #[serde(default)]
        content: Option<String>,
        /// Tool calls emitted this turn, empty when the turn is a
        /// terminal text-only response.
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    /// The batch of tool results answering the prior assistant turn's
    /// tool calls, one block per call, in the same order.
    ToolResult {
        /// Result blocks, ordered to match the tool calls they answer.
        blocks: Vec<ToolResultBlock>,
    },
}

impl Message {
    /// Builds a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Builds a text-only assistant message.
    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Builds an assistant message carrying tool calls, with optional
    /// accompanying text.
    #[must_use]
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content,
            tool_calls,
        }
    }

    /// Builds a tool-result batch message.
    #[must_use]
    pub fn tool_results(blocks: Vec<ToolResultBlock>) -> Self {
        Self::ToolResult { blocks }
    }

    /// Returns the assistant's tool calls, if this is an assistant
    /// message carrying any.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Cumulative or per-call token usage. All three fields are always
/// present; zero is an acceptable value for a vendor that does not
/// report usage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input (prompt) tokens.
    pub input_tokens: u64,
    /// Output (completion) tokens.
    pub output_tokens: u64,
    /// Total tokens; vendors that only report input/output have this
    /// computed as their sum.
    pub total_tokens: u64,
}

impl Usage {
    /// Builds a usage record, computing `total_tokens` as the sum of
    /// the other two.
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Accumulates another usage record into this one in place, used by
    /// the agent loop to merge per-iteration usage into a session total.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Why the model stopped generating, normalized across vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of a text response.
    Stop,
    /// The model emitted one or more tool calls. Always used when
    /// `tool_calls` is non-empty, even if the vendor reports a generic
    /// "stop" alongside them.
    ToolUse,
    /// Generation was cut off by the token budget.
    MaxTokens,
    /// The vendor's safety filter intervened.
    Safety,
    /// The vendor reported a request-level error.
    Error,
}

/// A normalized, non-streaming model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Concatenation, in order, of every text fragment in the response.
    pub content: String,
    /// Every tool-invocation block in the response, arguments already
    /// normalized to plain JSON.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this call alone (not cumulative).
    pub usage: Usage,
    /// Normalized stop reason.
    pub stop_reason: StopReason,
    /// The model identifier that produced this response.
    pub model: String,
}

impl ProviderResponse {
    /// Whether this response carries any tool calls for the loop to
    /// execute.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A streamed output frame. Tool-use-during-stream is unsupported by
/// this core (see [`crate::provider::LlmProvider::stream_chat`]); a
/// stream therefore only ever yields text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A fragment of response text.
    Chunk {
        /// The text fragment.
        content: String,
    },
    /// The stream has ended.
    End {
        /// Final usage, when the vendor reports it with the terminal
        /// frame.
        usage: Option<Usage>,
    },
}

/// Re-exported so provider modules can build a tool catalog without a
/// second import path.
pub type NeutralToolDefinition = ToolDefinition;
