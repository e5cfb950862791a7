//! The tool executor (C8): turns one model-emitted [`ToolCall`] into one
//! [`ToolResultBlock`], recording a pending-then-resolved audit row
//! around the call and reducing whatever the tool returned to the
//! plain-string shape the conversation replays.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use opsagent_audit::{AuditStorage, AuditToolCall, CallStatus, ToolCallPatch};
use opsagent_core::{CallId, SessionId};
use opsagent_llm::{ToolCall, ToolResultBlock};
use opsagent_tools::{ToolRegistry, ToolResult, ToolStatus};
use serde_json::Value;
use tracing::warn;

/// Tool executions are capped at this wall-clock duration by default; a
/// timed-out execution is reported as an `error` result, not raised.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Reserved argument key carrying a confirm token back into a
/// policy-sensitive tool's next invocation. Stripped before the
/// arguments are written to the audit log.
const CONFIRM_TOKEN_KEY: &str = "_confirm_token";

/// Looks up and runs one tool call, recording its audit row.
///
/// Tool-not-found and tool-timeout are both reported as `error` results
/// rather than propagated: the agent loop never fails because of what a
/// single tool call did, only because the provider itself failed.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    audit: Arc<dyn AuditStorage>,
    timeout: Duration,
}

impl ToolExecutor {
    /// Builds an executor with [`DEFAULT_TOOL_TIMEOUT`].
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, audit: Arc<dyn AuditStorage>) -> Self {
        Self::with_timeout(registry, audit, DEFAULT_TOOL_TIMEOUT)
    }

    /// Builds an executor with a caller-chosen per-call timeout.
    #[must_use]
    pub fn with_timeout(
        registry: Arc<ToolRegistry>,
        audit: Arc<dyn AuditStorage>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            audit,
            timeout,
        }
    }

    /// Executes one tool call and returns the block to append to the
    /// conversation's next tool-result batch.
    pub async fn execute(&self, session_id: SessionId, call: &ToolCall) -> ToolResultBlock {
        let call_id = CallId::new();
        let audit_args = redact_confirm_token(&call.arguments);
        self.audit
            .add_tool_call(AuditToolCall::pending(
                call_id,
                session_id,
                call.name.clone(),
                audit_args,
            ))
            .await;

        let Some(tool) = self.registry.get(&call.name) else {
            let content = format!("Tool `{}` not found", call.name);
            self.finish(call_id, ToolResult::error(content.clone()), 0.0)
                .await;
            return ToolResultBlock::error(&call.id, content);
        };

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, tool.execute(call.arguments.clone())).await {
            Ok(result) => result,
            Err(_) => ToolResult::error(format!(
                "tool `{}` timed out after {}s",
                call.name,
                self.timeout.as_secs()
            )),
        };
        let duration = start.elapsed().as_secs_f64();

        let block = to_block(&call.id, &result);
        self.finish(call_id, result, duration).await;
        block
    }

    async fn finish(&self, call_id: CallId, result: ToolResult, duration: f64) {
        let (policy_triggered, policy_effect) = policy_fields(&result);
        let patch = ToolCallPatch {
            policy_triggered,
            policy_effect,
            execution_end: Some(Utc::now()),
            exit_code: result.exit_code,
            stdout_summary: Some(result.output.clone()),
            stderr: if result.error.is_empty() {
                None
            } else {
                Some(result.error.clone())
            },
            duration_sec: Some(duration),
            status: Some(call_status(result.status)),
            extra_data: result.metadata.clone(),
            ..Default::default()
        };
        if let Err(e) = self.audit.update_tool_call(call_id, patch).await {
            warn!(%call_id, error = %e, "failed to record tool call outcome");
        }
    }
}

fn call_status(status: ToolStatus) -> CallStatus {
    match status {
        ToolStatus::Success => CallStatus::Success,
        ToolStatus::Error => CallStatus::Error,
        ToolStatus::PendingConfirm => CallStatus::PendingConfirm,
    }
}

fn policy_fields(result: &ToolResult) -> (Option<String>, Option<String>) {
    let Some(decision) = result.metadata.as_ref().and_then(|m| m.get("policy_decision")) else {
        return (None, None);
    };
    let triggered = decision
        .get("triggered_rule")
        .and_then(Value::as_str)
        .map(str::to_string);
    let effect = decision
        .get("effect")
        .and_then(Value::as_str)
        .map(str::to_string);
    (triggered, effect)
}

/// Reduces a [`ToolResult`] to the plain-string shape the conversation
/// replays, per the selection rule: success reads `output` (plus a
/// trailing stderr note when present); error prefers `error`, falls
/// back to `output`, then a fixed placeholder; pending-confirm renders a
/// preview block followed by the token and re-invocation instructions.
fn to_block(tool_call_id: &str, result: &ToolResult) -> ToolResultBlock {
    match result.status {
        ToolStatus::Success => {
            let mut content = result.output.clone();
            if !result.error.is_empty() {
                content.push_str("\n(stderr: ");
                content.push_str(&result.error);
                content.push(')');
            }
            ToolResultBlock::success(tool_call_id, content)
        },
        ToolStatus::Error => {
            let content = if !result.error.is_empty() {
                result.error.clone()
            } else if !result.output.is_empty() {
                result.output.clone()
            } else {
                "the tool failed without reporting a message".to_string()
            };
            ToolResultBlock::error(tool_call_id, content)
        },
        ToolStatus::PendingConfirm => {
            let mut lines = vec!["This action requires confirmation before it will run:".to_string()];
            if let Some(preview) = &result.preview {
                if let Some(map) = preview.as_object() {
                    for (key, value) in map {
                        lines.push(format!("- {key}: {}", render_preview_value(value)));
                    }
                } else {
                    lines.push(format!("- {preview}"));
                }
            }
            if let Some(token) = &result.confirm_token {
                lines.push(format!("Confirm token: {token}"));
                lines.push(
                    "Re-invoke this tool with the same arguments and `_confirm_token` set to the token above to proceed."
                        .to_string(),
                );
            }
            ToolResultBlock::success(tool_call_id, lines.join("\n"))
        },
    }
}

fn render_preview_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strips the confirm-token argument before arguments are written to
/// the audit log; confirm tokens must never appear in the clear in
/// `tool_args`.
fn redact_confirm_token(arguments: &Value) -> Value {
    let Some(map) = arguments.as_object() else {
        return arguments.clone();
    };
    let mut redacted = map.clone();
    if redacted.remove(CONFIRM_TOKEN_KEY).is_some() {
        redacted.insert(CONFIRM_TOKEN_KEY.to_string(), Value::String("<redacted>".to_string()));
    }
    Value::Object(redacted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opsagent_audit::InMemoryAuditStorage;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new())
    }

    struct Echo;

    #[async_trait]
    impl opsagent_tools::Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::success(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    struct Hangs;

    #[async_trait]
    impl opsagent_tools::Tool for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }
        fn description(&self) -> &str {
            "never returns"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value) -> ToolResult {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_error_without_failing() {
        let executor = ToolExecutor::new(registry(), Arc::new(InMemoryAuditStorage::new()));
        let call = ToolCall::new("call_1", "does_not_exist", json!({}));
        let block = executor.execute(SessionId::new(), &call).await;
        assert!(block.is_error);
        assert_eq!(block.content, "Tool `does_not_exist` not found");
    }

    #[tokio::test]
    async fn successful_call_is_recorded_and_returns_output() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo)).unwrap();
        let audit = Arc::new(InMemoryAuditStorage::new());
        let executor = ToolExecutor::new(Arc::new(reg), audit.clone());
        let session_id = SessionId::new();
        let call = ToolCall::new("call_1", "echo", json!({"text": "hi"}));
        let block = executor.execute(session_id, &call).await;
        assert!(!block.is_error);
        assert_eq!(block.content, "hi");

        let calls = audit.get_session_tool_calls(session_id).await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, CallStatus::Success);
    }

    #[tokio::test]
    async fn confirm_token_is_redacted_before_audit_write() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo)).unwrap();
        let audit = Arc::new(InMemoryAuditStorage::new());
        let executor = ToolExecutor::new(Arc::new(reg), audit.clone());
        let session_id = SessionId::new();
        let call = ToolCall::new(
            "call_1",
            "echo",
            json!({"text": "hi", "_confirm_token": "conf_super_secret"}),
        );
        executor.execute(session_id, &call).await;

        let calls = audit.get_session_tool_calls(session_id).await;
        assert_ne!(calls[0].tool_args["_confirm_token"], json!("conf_super_secret"));
    }

    #[tokio::test]
    async fn timed_out_execution_is_reported_as_error() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Hangs)).unwrap();
        let audit = Arc::new(InMemoryAuditStorage::new());
        let executor = ToolExecutor::with_timeout(Arc::new(reg), audit, Duration::from_millis(20));
        let call = ToolCall::new("call_1", "hangs", json!({}));
        let block = executor.execute(SessionId::new(), &call).await;
        assert!(block.is_error);
        assert!(block.content.contains("timed out"));
    }

    #[test]
    fn pending_confirm_renders_preview_token_and_instructions() {
        let result = ToolResult::pending_confirm(
            "conf_abc",
            json!({"command": "rm -rf /", "env": "prod"}),
        );
        let block = to_block("call_1", &result);
        assert!(!block.is_error);
        assert!(block.content.contains("conf_abc"));
        assert!(block.content.contains("Re-invoke"));
    }
}
