use chrono::{DateTime, Utc};
use opsagent_core::{CallId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the session's input was produced, kept distinct from the
/// structured/tool-driven path a re-invocation after a confirm token
/// takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Free-text operator request.
    NaturalLanguage,
    /// Pre-structured, programmatic invocation.
    Structured,
}

impl Default for InputMode {
    fn default() -> Self {
        Self::NaturalLanguage
    }
}

/// Lifecycle status of an [`AuditSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The agent loop is still iterating.
    Running,
    /// The loop reached a terminal (non-tool-use) model response.
    Completed,
    /// The loop was stopped by the iteration cap.
    Capped,
    /// The loop ended because the provider or a tool raised an
    /// unrecoverable error.
    Failed,
}

/// One agent-loop session, from the initial user turn to its terminal
/// outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSession {
    /// Primary key.
    pub session_id: SessionId,
    /// When the session was created.
    pub timestamp: DateTime<Utc>,
    /// Operator identity, when known.
    pub user: Option<String>,
    /// Host the agent runtime is running on.
    pub hostname: Option<String>,
    /// The user's initial request text.
    pub input: String,
    /// How `input` was produced.
    pub input_mode: InputMode,
    /// The agent's final natural-language output, once terminal.
    pub final_output: Option<String>,
    /// Free-text summary of the model's reasoning across iterations, if
    /// the provider surfaces one.
    pub agent_reasoning: Option<String>,
    /// Name of the LLM provider used for this session.
    pub provider: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Cumulative token usage, keyed by provider-reported field name.
    pub token_usage: Option<Value>,
    /// Wall-clock duration of the whole session, once terminal.
    pub total_duration_sec: Option<f64>,
    /// Estimated USD cost, when the provider publishes per-token
    /// pricing.
    pub cost_usd: Option<f64>,
    /// Free-form metadata bag, distinct from any field above.
    pub extra_data: Option<Value>,
}

impl AuditSession {
    /// Starts a new `Running` session for `input`.
    #[must_use]
    pub fn start(session_id: SessionId, input: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            session_id,
            timestamp: Utc::now(),
            user: std::env::var("USER").ok(),
            hostname: hostname(),
            input: input.into(),
            input_mode: InputMode::NaturalLanguage,
            final_output: None,
            agent_reasoning: None,
            provider: provider.into(),
            status: SessionStatus::Running,
            token_usage: None,
            total_duration_sec: None,
            cost_usd: None,
            extra_data: None,
        }
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
}

/// Confirmation state recorded against a tool call that was intercepted
/// by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Recorded before execution, not yet resolved.
    Pending,
    /// Ran to completion successfully.
    Success,
    /// Ran and failed, or failed to run.
    Error,
    /// Blocked pending confirmation.
    PendingConfirm,
}

/// One tool invocation within an [`AuditSession`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditToolCall {
    /// Primary key.
    pub call_id: CallId,
    /// Owning session.
    pub session_id: SessionId,
    /// Tool name as registered.
    pub tool_name: String,
    /// Arguments the call was made with (redacted on write, see
    /// [`crate::redact`]).
    pub tool_args: Value,
    /// Name of the policy rule that fired, if any.
    pub policy_triggered: Option<String>,
    /// Effect of the policy decision, if any rule fired.
    pub policy_effect: Option<String>,
    /// Whether the caller supplied a valid confirm token.
    pub user_confirmed: bool,
    /// When confirmation was recorded.
    pub confirm_time: Option<DateTime<Utc>>,
    /// When execution began.
    pub execution_start: Option<DateTime<Utc>>,
    /// When execution ended.
    pub execution_end: Option<DateTime<Utc>>,
    /// Process exit code, when applicable.
    pub exit_code: Option<i32>,
    /// Redacted summary of stdout/primary output.
    pub stdout_summary: Option<String>,
    /// Captured stderr / error text.
    pub stderr: Option<String>,
    /// Wall-clock execution time in seconds.
    pub duration_sec: Option<f64>,
    /// Current status.
    pub status: CallStatus,
    /// Free-form metadata bag.
    pub extra_data: Option<Value>,
}

impl AuditToolCall {
    /// Records a pending tool call before it runs.
    #[must_use]
    pub fn pending(call_id: CallId, session_id: SessionId, tool_name: impl Into<String>, tool_args: Value) -> Self {
        Self {
            call_id,
            session_id,
            tool_name: tool_name.into(),
            tool_args,
            policy_triggered: None,
            policy_effect: None,
            user_confirmed: false,
            confirm_time: None,
            execution_start: Some(Utc::now()),
            execution_end: None,
            exit_code: None,
            stdout_summary: None,
            stderr: None,
            duration_sec: None,
            status: CallStatus::Pending,
            extra_data: None,
        }
    }
}
