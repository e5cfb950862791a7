//! The tool contract (C3): a uniform `{name, description, input_schema,
//! async execute}` trait, a name-indexed registry, and two reference
//! tools (`ssh_exec`, `ssh_exec_batch`) that exercise the policy engine's
//! self-invocation and confirm-token re-entry contract end to end.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod registry;
mod ssh;
mod types;

pub use error::{ToolExecError, ToolExecResult};
pub use registry::{Tool, ToolRegistry};
pub use ssh::{HostConfig, HostResolver, LocalProcessExecutor, RemoteExecutor, SshExecBatchTool, SshExecTool};
pub use types::{ToolDefinition, ToolResult, ToolStatus};
