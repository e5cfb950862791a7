//! The audit store (C4): session and tool-call records, redacted before
//! being written, behind a pluggable [`AuditStorage`] trait.
//!
//! Writes are meant to be best-effort: a caller recording a tool call
//! result should not let an audit-store failure fail the tool call
//! itself. [`AuditStorage`]'s `Result`-returning methods exist for
//! callers that want to *observe* failures for their own logging, not to
//! force propagation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod models;
pub mod redact;
mod storage;

pub use error::{AuditError, AuditResult};
pub use models::{AuditSession, AuditToolCall, CallStatus, InputMode, SessionStatus};
pub use storage::{AuditStorage, InMemoryAuditStorage, SessionPatch, ToolCallPatch};
