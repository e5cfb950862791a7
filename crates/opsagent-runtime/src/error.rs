use thiserror::Error;

/// Errors that terminate the agent loop outright.
///
/// Everything a tool or the policy engine can report short of this is
/// reified as a tool result the model can read and recover from; this
/// type only covers what the loop itself cannot route around — a
/// provider failure, or a configuration problem caught before the first
/// iteration.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The LLM provider call failed outright (transport, auth, malformed
    /// response). Surfaced as a loop-terminating `stop_reason = error`.
    #[error("provider error: {0}")]
    Provider(#[from] opsagent_llm::LlmError),
}

/// Convenience alias for fallible agent-loop operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
