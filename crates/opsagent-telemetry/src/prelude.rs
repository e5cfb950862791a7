//! Commonly used types for convenient import.
//!
//! ```
//! use opsagent_telemetry::prelude::*;
//! ```

pub use crate::{TelemetryError, TelemetryResult};

pub use crate::{LogConfig, LogFormat, LogTarget};

pub use crate::{setup_default_logging, setup_logging};

pub use crate::{RequestContext, RequestGuard};
