use thiserror::Error;

/// Errors raised by the audit store.
///
/// Writes are meant to be best-effort from the caller's perspective (a
/// failed audit write must never fail the tool call it describes); this
/// type exists so a caller that *does* want to observe storage failures
/// (for its own logging) can.
#[derive(Debug, Error)]
pub enum AuditError {
    /// No session exists with the given id.
    #[error("unknown session: {0}")]
    UnknownSession(String),
    /// No tool call exists with the given id.
    #[error("unknown tool call: {0}")]
    UnknownToolCall(String),
}

/// Convenience alias for fallible audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
