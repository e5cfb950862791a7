//! Logging and tracing setup for the ops-agent runtime.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - Request context for correlation across operations
//! - Integration with the tracing ecosystem
//!
//! # Example
//!
//! ```no_run
//! use opsagent_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), opsagent_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("opsagent_runtime=trace");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("agent_loop").with_operation("run_session");
//! let _guard = ctx.enter();
//! tracing::info!("processing request");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget};
