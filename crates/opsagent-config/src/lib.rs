//! TOML configuration schema and loader for providers, hosts, and
//! policy rules: `[llm]`, `[hosts.*]`, `[jumps.*]`, `[[policies]]`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_file, parse};
pub use schema::{AppConfig, HostEntry, JumpHostEntry, LlmConfig, ProviderConfig, RoutingRule};
