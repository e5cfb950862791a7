//! The agent loop (C7) and tool executor (C8): the core runtime that
//! drives one user turn through bounded model/tool-execution iteration,
//! recording an audit trail as it goes.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod agent_loop;
mod error;
mod executor;

pub use agent_loop::{AgentLoop, LoopOutcome, DEFAULT_MAX_ITERATIONS, HARD_ITERATION_CAP};
pub use error::{RuntimeError, RuntimeResult};
pub use executor::{ToolExecutor, DEFAULT_TOOL_TIMEOUT};
