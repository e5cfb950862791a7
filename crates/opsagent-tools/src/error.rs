use thiserror::Error;

/// Errors raised by the tool registry itself (not by individual tool
/// executions, which report failure through [`crate::ToolResult`]
/// instead of an `Err`).
#[derive(Debug, Error)]
pub enum ToolExecError {
    /// Registration was attempted for a name already present in the
    /// registry.
    #[error("tool {0:?} is already registered")]
    DuplicateTool(String),
}

/// Convenience alias for fallible registry operations.
pub type ToolExecResult<T> = Result<T, ToolExecError>;
