//! Builds the shared runtime collaborators (provider router, tool
//! registry, policy engine, audit store) from a loaded [`AppConfig`].
//!
//! Kept separate from `main.rs` so every command that needs "the whole
//! runtime" constructs it the same way.

use std::collections::HashMap;
use std::sync::Arc;

use opsagent_audit::{AuditStorage, InMemoryAuditStorage};
use opsagent_config::AppConfig;
use opsagent_llm::ProviderRouter;
use opsagent_policy::PolicyEngine;
use opsagent_tools::{HostConfig, HostResolver, LocalProcessExecutor, SshExecBatchTool, SshExecTool, ToolRegistry};

/// Resolves host aliases against the `[hosts.*]` table of a loaded
/// config document.
struct ConfigHostResolver {
    hosts: HashMap<String, HostConfig>,
}

impl HostResolver for ConfigHostResolver {
    fn resolve(&self, alias: &str) -> Option<HostConfig> {
        self.hosts.get(alias).cloned()
    }
}

/// Everything a command needs to run the agent loop.
pub struct Runtime {
    /// Resolves and memoizes LLM provider instances.
    pub router: Arc<ProviderRouter>,
    /// The tool catalog the agent loop advertises to the model.
    pub registry: Arc<ToolRegistry>,
    /// Shared audit storage.
    pub audit: Arc<dyn AuditStorage>,
}

/// Builds the shared runtime collaborators from `config`.
///
/// The reference `ssh_exec`/`ssh_exec_batch` tools are registered using
/// [`LocalProcessExecutor`] as their transport: this crate ships no
/// production SSH client, so every "remote" command actually runs
/// locally. A deployment wires its own [`opsagent_tools::RemoteExecutor`]
/// in its place.
#[must_use]
pub fn build_runtime(config: AppConfig) -> Runtime {
    let policy = Arc::new(PolicyEngine::new(config.policies.clone()));

    let hosts = config
        .hosts
        .iter()
        .map(|(alias, entry)| {
            (
                alias.clone(),
                HostConfig {
                    addr: entry.addr.clone(),
                    env: entry.env,
                },
            )
        })
        .collect();
    let resolver = Arc::new(ConfigHostResolver { hosts });
    let executor = Arc::new(LocalProcessExecutor);

    let single = Arc::new(SshExecTool::new(policy.clone(), resolver, executor));
    let batch = Arc::new(SshExecBatchTool::new(policy, single.clone()));

    let mut registry = ToolRegistry::new();
    registry.register(single).expect("ssh_exec registers once");
    registry.register(batch).expect("ssh_exec_batch registers once");

    Runtime {
        router: Arc::new(ProviderRouter::new(config.llm)),
        registry: Arc::new(registry),
        audit: Arc::new(InMemoryAuditStorage::new()),
    }
}
