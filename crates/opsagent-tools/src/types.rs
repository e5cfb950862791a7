use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome bucket for a [`ToolResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// The tool ran to completion without error.
    Success,
    /// The tool failed to run, or ran and reported failure.
    Error,
    /// The underlying operation was blocked by policy pending a confirm
    /// token; `confirm_token`/`preview` on [`ToolResult`] are populated.
    PendingConfirm,
}

/// The JSON-schema tool definition surfaced to LLM providers and the
/// tool registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name, used as the registry key and as the
    /// `ToolCall::name` providers echo back.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema describing the tool's input arguments.
    pub input_schema: Value,
}

/// The result of executing a tool call.
///
/// A `PendingConfirm` result is not an error: it means the call was
/// intercepted by policy and must be retried with `_confirm_token` set
/// to the returned token before it will actually run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Outcome bucket.
    pub status: ToolStatus,
    /// Captured stdout / primary output, present on success.
    #[serde(default)]
    pub output: String,
    /// Captured stderr / error description, present on error.
    #[serde(default)]
    pub error: String,
    /// Process exit code, when the tool wraps a subprocess.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Wall-clock execution time in seconds.
    #[serde(default)]
    pub duration_sec: f64,
    /// Free-form metadata (e.g. resolved host, policy decision) attached
    /// by the tool.
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Present on `PendingConfirm`: the token to replay with
    /// `_confirm_token`.
    #[serde(default)]
    pub confirm_token: Option<String>,
    /// Present on `PendingConfirm`: a human-readable summary of what
    /// confirmation would authorize.
    #[serde(default)]
    pub preview: Option<Value>,
}

impl ToolResult {
    /// Builds a `Success` result from captured output.
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            output: output.into(),
            error: String::new(),
            exit_code: None,
            duration_sec: 0.0,
            metadata: None,
            confirm_token: None,
            preview: None,
        }
    }

    /// Builds an `Error` result from a message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            output: String::new(),
            error: message.into(),
            exit_code: None,
            duration_sec: 0.0,
            metadata: None,
            confirm_token: None,
            preview: None,
        }
    }

    /// Builds a `PendingConfirm` result carrying the token and preview
    /// the caller must present to proceed.
    #[must_use]
    pub fn pending_confirm(confirm_token: impl Into<String>, preview: Value) -> Self {
        Self {
            status: ToolStatus::PendingConfirm,
            output: String::new(),
            error: String::new(),
            exit_code: None,
            duration_sec: 0.0,
            metadata: None,
            confirm_token: Some(confirm_token.into()),
            preview: Some(preview),
        }
    }

    /// Attaches metadata, returning `self` for chaining.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the exit code and duration, returning `self` for chaining.
    #[must_use]
    pub fn with_exit(mut self, exit_code: i32, duration_sec: f64) -> Self {
        self.exit_code = Some(exit_code);
        self.duration_sec = duration_sec;
        self
    }
}
