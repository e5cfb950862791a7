//! Reference tools exercising the registry, the policy engine's
//! self-invocation contract, and confirm-token re-entry end to end:
//! `ssh_exec` (single host) and `ssh_exec_batch` (host list).
//!
//! The actual remote transport is delegated to a [`RemoteExecutor`]
//! collaborator; [`LocalProcessExecutor`] is a stand-in that runs the
//! command as a local subprocess, useful for tests and demos only. A
//! production deployment supplies its own [`RemoteExecutor`] backed by
//! an SSH client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use opsagent_classify::classify_command;
use opsagent_core::Env;
use opsagent_policy::{PolicyEffect, PolicyEngine};
use serde_json::{json, Value};

use crate::registry::Tool;
use crate::types::{ToolResult, ToolStatus};

/// The address a host alias resolves to.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Network address or hostname to connect to.
    pub addr: String,
    /// Environment this host belongs to, used when the caller omits one.
    pub env: Env,
}

/// Resolves host aliases to connection details, matching the
/// `hosts:` table of a deployment's configuration.
pub trait HostResolver: Send + Sync {
    /// Looks up a host alias.
    fn resolve(&self, alias: &str) -> Option<HostConfig>;
}

/// Runs a single command against a single resolved host and returns its
/// exit code, stdout, and stderr.
///
/// This is the seam a real SSH transport plugs into; this crate ships no
/// production implementation of it.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Executes `command` against `host` and returns
    /// `(exit_code, stdout, stderr)`.
    async fn run(&self, host: &HostConfig, command: &str) -> Result<(i32, String, String), String>;
}

/// Runs commands as a local subprocess, ignoring `host` entirely. Exists
/// so the tool pipeline is exercisable in tests and demos without a real
/// remote transport; never use this against untrusted input in
/// production.
#[derive(Debug, Default)]
pub struct LocalProcessExecutor;

#[async_trait]
impl RemoteExecutor for LocalProcessExecutor {
    async fn run(&self, _host: &HostConfig, command: &str) -> Result<(i32, String, String), String> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| e.to_string())?;
        Ok((
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

/// `ssh_exec`: runs one shell command on one host, subject to policy.
pub struct SshExecTool {
    policy: Arc<PolicyEngine>,
    hosts: Arc<dyn HostResolver>,
    executor: Arc<dyn RemoteExecutor>,
}

impl SshExecTool {
    /// Builds the tool over a policy engine, host resolver, and remote
    /// transport.
    #[must_use]
    pub fn new(
        policy: Arc<PolicyEngine>,
        hosts: Arc<dyn HostResolver>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Self {
        Self {
            policy,
            hosts,
            executor,
        }
    }
}

#[async_trait]
impl Tool for SshExecTool {
    fn name(&self) -> &str {
        "ssh_exec"
    }

    fn description(&self) -> &str {
        "Executes a shell command on a remote host, identified by alias or jump-host configuration."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "host": {"type": "string", "description": "host alias or address"},
                "command": {"type": "string", "description": "shell command to run"},
                "env": {"type": "string", "enum": ["dev", "staging", "prod"]},
                "timeout": {"type": "integer", "default": 30},
                "_confirm_token": {"type": "string", "description": "confirm token from a prior PendingConfirm result"},
            },
            "required": ["host", "command"],
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(host_alias) = args.get("host").and_then(Value::as_str) else {
            return ToolResult::error("missing required argument: host");
        };
        let Some(command) = args.get("command").and_then(Value::as_str) else {
            return ToolResult::error("missing required argument: command");
        };
        let confirm_token = args.get("_confirm_token").and_then(Value::as_str);

        let Some(host_config) = self.hosts.resolve(host_alias) else {
            return ToolResult::error(format!(
                "host {host_alias:?} not found; check the configured hosts table"
            ));
        };

        let env = args
            .get("env")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(host_config.env);

        let action_type = classify_command(command);
        let check_args = json!({"host": host_alias, "command": command, "env": env.to_string()});
        let decision = match self
            .policy
            .check(self.name(), &check_args, Some(env), Some(action_type))
        {
            Ok(decision) => decision,
            Err(e) => return ToolResult::error(format!("policy evaluation failed: {e}")),
        };

        if decision.effect == PolicyEffect::Deny {
            return ToolResult::error(format!("denied by policy: {}", decision.message))
                .with_metadata(json!({"policy_decision": decision}));
        }

        if decision.effect == PolicyEffect::RequireConfirm {
            let confirmed = confirm_token
                .map(|t| self.policy.validate_confirm_token(t))
                .unwrap_or(false);
            if !confirmed {
                return ToolResult::pending_confirm(
                    decision.confirm_token.clone().unwrap_or_default(),
                    json!({
                        "host_info": format!("{host_alias} ({})", host_config.addr),
                        "command": command,
                        "action_type": action_type,
                        "env": env.to_string(),
                        "risk_level": decision.risk_level,
                        "message": decision.message,
                    }),
                )
                .with_metadata(json!({"policy_decision": decision}));
            }
            // one-shot: drop the returned original args, we already have
            // the live call's arguments.
            self.policy.consume_confirm_token(confirm_token.expect("checked above"));
        }

        let start = Instant::now();
        match self.executor.run(&host_config, command).await {
            Ok((exit_code, stdout, stderr)) => {
                let duration = start.elapsed().as_secs_f64();
                if exit_code == 0 {
                    ToolResult::success(stdout)
                        .with_exit(exit_code, duration)
                        .with_metadata(json!({
                            "host": host_alias,
                            "resolved_addr": host_config.addr,
                        }))
                } else {
                    let error = if stderr.is_empty() {
                        format!("command exited with code {exit_code}")
                    } else {
                        stderr.clone()
                    };
                    ToolResult {
                        status: ToolStatus::Error,
                        output: stdout,
                        error,
                        exit_code: Some(exit_code),
                        duration_sec: duration,
                        metadata: None,
                        confirm_token: None,
                        preview: None,
                    }
                }
            }
            Err(message) => ToolResult::error(format!("ssh execution failed for {host_alias}: {message}")),
        }
    }
}

/// `ssh_exec_batch`: runs one shell command across a list of hosts,
/// preserving the caller's host order in the aggregated output despite
/// concurrent fan-out.
pub struct SshExecBatchTool {
    policy: Arc<PolicyEngine>,
    single: Arc<SshExecTool>,
}

impl SshExecBatchTool {
    /// Builds the batch tool, reusing a single-host [`SshExecTool`] for
    /// each target.
    #[must_use]
    pub fn new(policy: Arc<PolicyEngine>, single: Arc<SshExecTool>) -> Self {
        Self { policy, single }
    }
}

#[async_trait]
impl Tool for SshExecBatchTool {
    fn name(&self) -> &str {
        "ssh_exec_batch"
    }

    fn description(&self) -> &str {
        "Executes the same shell command across a list of hosts, in parallel by default."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "hosts": {"type": "array", "items": {"type": "string"}},
                "command": {"type": "string"},
                "parallel": {"type": "boolean", "default": true},
                "continue_on_error": {"type": "boolean", "default": false},
                "_confirm_token": {"type": "string"},
            },
            "required": ["hosts", "command"],
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let Some(hosts) = args.get("hosts").and_then(Value::as_array) else {
            return ToolResult::error("missing required argument: hosts");
        };
        let hosts: Vec<String> = hosts
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let Some(command) = args.get("command").and_then(Value::as_str) else {
            return ToolResult::error("missing required argument: command");
        };
        let parallel = args
            .get("parallel")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let confirm_token = args.get("_confirm_token").and_then(Value::as_str);

        let check_args = json!({"hosts": hosts, "command": command});
        let decision = match self.policy.check(self.name(), &check_args, None, None) {
            Ok(decision) => decision,
            Err(e) => return ToolResult::error(format!("policy evaluation failed: {e}")),
        };

        if decision.effect == PolicyEffect::RequireConfirm {
            let confirmed = confirm_token
                .map(|t| self.policy.validate_confirm_token(t))
                .unwrap_or(false);
            if !confirmed {
                return ToolResult::pending_confirm(
                    decision.confirm_token.clone().unwrap_or_default(),
                    json!({
                        "host_count": hosts.len(),
                        "hosts": hosts,
                        "command": command,
                        "message": decision.message,
                    }),
                );
            }
            self.policy.consume_confirm_token(confirm_token.expect("checked above"));
        }

        // The per-host policy check inside SshExecTool::execute would
        // otherwise re-require confirmation for each host; pass the
        // already-validated token through so each call's own check sees
        // a consumed (now absent) token and re-mints one only if its own
        // per-host rule independently requires it.
        let per_host_args = |host: &str| {
            json!({"host": host, "command": command, "_confirm_token": confirm_token})
        };

        let results: Vec<ToolResult> = if parallel {
            let futures = hosts
                .iter()
                .map(|host| self.single.execute(per_host_args(host)));
            join_all(futures).await
        } else {
            let mut out = Vec::with_capacity(hosts.len());
            for host in &hosts {
                out.push(self.single.execute(per_host_args(host)).await);
            }
            out
        };

        let success_count = results
            .iter()
            .filter(|r| r.status == ToolStatus::Success)
            .count();
        let error_count = results.len() - success_count;

        let mut output_lines = Vec::with_capacity(hosts.len());
        let mut per_host: HashMap<&str, &ToolResult> = HashMap::new();
        for (host, result) in hosts.iter().zip(results.iter()) {
            per_host.insert(host.as_str(), result);
        }
        for host in &hosts {
            let result = per_host[host.as_str()];
            let marker = if result.status == ToolStatus::Success {
                "ok"
            } else {
                "fail"
            };
            let detail = if result.output.is_empty() {
                &result.error
            } else {
                &result.output
            };
            output_lines.push(format!("[{marker}] {host}: {detail}"));
        }

        ToolResult {
            status: if error_count == 0 {
                ToolStatus::Success
            } else {
                ToolStatus::Error
            },
            output: output_lines.join("\n"),
            error: String::new(),
            exit_code: None,
            duration_sec: 0.0,
            metadata: Some(json!({
                "total": hosts.len(),
                "success": success_count,
                "error": error_count,
                "results": hosts.iter().zip(results.iter()).map(|(h, r)| json!({
                    "host": h,
                    "status": r.status,
                    "exit_code": r.exit_code,
                })).collect::<Vec<_>>(),
            })),
            confirm_token: None,
            preview: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedHosts(HashMap<String, HostConfig>);

    impl HostResolver for FixedHosts {
        fn resolve(&self, alias: &str) -> Option<HostConfig> {
            self.0.get(alias).cloned()
        }
    }

    struct ScriptedExecutor {
        responses: Mutex<HashMap<String, (i32, String, String)>>,
    }

    #[async_trait]
    impl RemoteExecutor for ScriptedExecutor {
        async fn run(&self, host: &HostConfig, _command: &str) -> Result<(i32, String, String), String> {
            self.responses
                .lock()
                .unwrap()
                .get(&host.addr)
                .cloned()
                .ok_or_else(|| "no scripted response".to_string())
        }
    }

    fn hosts_fixture() -> Arc<dyn HostResolver> {
        let mut m = HashMap::new();
        for n in 1..=6 {
            m.insert(
                format!("host{n}"),
                HostConfig {
                    addr: format!("10.0.0.{n}"),
                    env: Env::Dev,
                },
            );
        }
        Arc::new(FixedHosts(m))
    }

    fn ok_executor() -> Arc<dyn RemoteExecutor> {
        let mut responses = HashMap::new();
        for n in 1..=6 {
            responses.insert(format!("10.0.0.{n}"), (0, format!("ok from host{n}"), String::new()));
        }
        Arc::new(ScriptedExecutor {
            responses: Mutex::new(responses),
        })
    }

    #[tokio::test]
    async fn unknown_host_is_an_error_without_touching_policy() {
        let policy = Arc::new(PolicyEngine::new(vec![]));
        let tool = SshExecTool::new(policy, hosts_fixture(), ok_executor());
        let result = tool
            .execute(json!({"host": "ghost", "command": "uptime"}))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.error.contains("not found"));
    }

    #[tokio::test]
    async fn read_command_in_dev_runs_immediately() {
        let policy = Arc::new(PolicyEngine::new(vec![]));
        let tool = SshExecTool::new(policy, hosts_fixture(), ok_executor());
        let result = tool
            .execute(json!({"host": "host1", "command": "uptime"}))
            .await;
        assert_eq!(result.status, ToolStatus::Success);
        assert_eq!(result.output, "ok from host1");
    }

    #[tokio::test]
    async fn batch_preserves_input_host_order_under_parallel_fanout() {
        let policy = Arc::new(PolicyEngine::new(vec![]));
        let single = Arc::new(SshExecTool::new(
            policy.clone(),
            hosts_fixture(),
            ok_executor(),
        ));
        let batch = SshExecBatchTool::new(policy, single);
        let result = batch
            .execute(json!({
                "hosts": ["host3", "host1", "host2"],
                "command": "uptime",
                "parallel": true,
            }))
            .await;
        assert_eq!(result.status, ToolStatus::Success);
        let lines: Vec<&str> = result.output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("host3"));
        assert!(lines[1].contains("host1"));
        assert!(lines[2].contains("host2"));
    }
}
