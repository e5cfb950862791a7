use std::collections::HashMap;

use opsagent_core::Env;
use opsagent_policy::PolicyRule;
use serde::{Deserialize, Serialize};

/// Configuration for a single LLM provider entry under
/// `[llm.providers.<name>]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Model identifier passed to the vendor API.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum tokens requested per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

/// A scenario-based routing override: calls tagged with `scenario` use
/// `provider` (and optionally a different `model`) instead of the
/// configured default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Scenario name a caller tags its request with.
    pub scenario: String,
    /// Provider name to route to.
    pub provider: String,
    /// Optional model override.
    #[serde(default)]
    pub model: Option<String>,
}

/// `[llm]` table: provider registry, default provider, and scenario
/// routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider used when no explicit name or matching scenario routing
    /// rule is given.
    #[serde(default = "default_provider_name")]
    pub default_provider: String,
    /// Named provider configurations.
    pub providers: HashMap<String, ProviderConfig>,
    /// Scenario routing table, tried before falling back to
    /// `default_provider`.
    #[serde(default)]
    pub routing: Vec<RoutingRule>,
}

fn default_provider_name() -> String {
    "claude".to_string()
}

/// `[hosts.<alias>]` table: a single SSH-reachable target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEntry {
    /// Environment this host belongs to.
    pub env: Env,
    /// SSH username.
    pub user: String,
    /// Network address or hostname.
    pub addr: String,
    /// SSH port.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Alias of a jump host to tunnel through, if any.
    #[serde(default)]
    pub jump: Option<String>,
    /// Path to an SSH private key, if not using the default identity.
    #[serde(default)]
    pub ssh_key: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

/// `[jumps.<alias>]` table: a bastion/jump host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpHostEntry {
    /// Network address or hostname.
    pub addr: String,
    /// SSH username.
    pub user: String,
    /// SSH port.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

/// The full configuration document: `[llm]`, `[hosts.*]`, `[jumps.*]`,
/// and an ordered `[[policies]]` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider configuration and routing.
    pub llm: LlmConfig,
    /// Named SSH targets.
    #[serde(default)]
    pub hosts: HashMap<String, HostEntry>,
    /// Named jump hosts.
    #[serde(default)]
    pub jumps: HashMap<String, JumpHostEntry>,
    /// Ordered policy rules, evaluated first-match-wins.
    #[serde(default)]
    pub policies: Vec<PolicyRule>,
}
