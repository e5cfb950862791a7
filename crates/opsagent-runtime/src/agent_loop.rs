//! The agent loop (C7): bounded model/tool-execution iteration over one
//! session, producing a single terminal outcome for its caller.
//!
//! Mirrors the gather-tool-defs -> call-model -> accumulate-tool-calls
//! -> execute -> continue cycle of a conventional streaming run loop,
//! generalized with an iteration cap and made strictly sequential per
//! session rather than streamed.

use std::sync::Arc;

use opsagent_audit::{AuditSession, AuditStorage, SessionPatch, SessionStatus};
use opsagent_core::SessionId;
use opsagent_llm::{
    Conversation, LlmProvider, NeutralToolDefinition, ProviderResponse, Usage,
};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::error::RuntimeResult;
use crate::executor::ToolExecutor;

/// Iterations attempted before the loop gives up on reaching a terminal
/// response, unless a caller passes a smaller `max_iterations`.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// No caller may raise `max_iterations` past this; it bounds the
/// worst-case cost of a single session regardless of configuration.
pub const HARD_ITERATION_CAP: u32 = 20;

/// The loop's sole return value: the last [`ProviderResponse`], the
/// cumulative usage across every iteration, and whether the loop
/// exited by reaching its iteration cap rather than a natural
/// `stop_reason`.
///
/// `capped` is carried alongside `response` rather than folded into it
/// (e.g. as a text suffix on `content`) so a caller can distinguish "the
/// model finished" from "the model was still mid-tool-use when the
/// budget ran out" structurally instead of by parsing text.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// The last model response. When `capped` is true this is the
    /// tool-use turn that exceeded the cap: `stop_reason == ToolUse`
    /// and `tool_calls` non-empty but deliberately left unexecuted.
    pub response: ProviderResponse,
    /// Token usage summed across every iteration this session ran.
    pub usage: Usage,
    /// Whether the loop exited by exhausting `max_iterations` rather
    /// than reaching a response with no tool calls.
    pub capped: bool,
}

/// Drives one user turn through however many model/tool iterations it
/// takes, recording an [`AuditSession`] and one tool-call audit row per
/// invocation along the way.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    executor: ToolExecutor,
    audit: Arc<dyn AuditStorage>,
    tool_defs: Vec<NeutralToolDefinition>,
    max_iterations: u32,
}

impl AgentLoop {
    /// Builds a loop using [`DEFAULT_MAX_ITERATIONS`].
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: ToolExecutor,
        audit: Arc<dyn AuditStorage>,
        tool_defs: Vec<NeutralToolDefinition>,
    ) -> Self {
        Self::with_max_iterations(provider, executor, audit, tool_defs, DEFAULT_MAX_ITERATIONS)
    }

    /// Builds a loop with an explicit iteration cap, clamped to
    /// [`HARD_ITERATION_CAP`].
    #[must_use]
    pub fn with_max_iterations(
        provider: Arc<dyn LlmProvider>,
        executor: ToolExecutor,
        audit: Arc<dyn AuditStorage>,
        tool_defs: Vec<NeutralToolDefinition>,
        max_iterations: u32,
    ) -> Self {
        Self {
            provider,
            executor,
            audit,
            tool_defs,
            max_iterations: max_iterations.clamp(1, HARD_ITERATION_CAP),
        }
    }

    /// Runs one session to completion: appends `user_prompt`, iterates
    /// model/tool-execution cycles in strict sequence, and returns the
    /// terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::RuntimeError::Provider`] if the model
    /// call itself fails. Tool failures and policy decisions never
    /// reach this path; they are reified as tool results instead.
    #[instrument(skip(self, user_prompt), fields(%session_id))]
    pub async fn run(&self, session_id: SessionId, user_prompt: &str) -> RuntimeResult<LoopOutcome> {
        let mut conversation = Conversation::new();
        conversation.add_user(user_prompt);

        let session = AuditSession::start(session_id, user_prompt, self.provider.name());
        self.audit.create_session(session).await;

        let mut cumulative = Usage::default();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, "awaiting-model");
            let response = self
                .provider
                .chat(&conversation.get_messages(), &self.tool_defs)
                .await?;
            cumulative.accumulate(&response.usage);

            if !response.has_tool_calls() {
                debug!(iteration, "terminal");
                self.finish(session_id, &response, cumulative, SessionStatus::Completed)
                    .await;
                return Ok(LoopOutcome {
                    response,
                    usage: cumulative,
                    capped: false,
                });
            }

            if iteration == self.max_iterations {
                debug!(iteration, "capped");
                self.finish(session_id, &response, cumulative, SessionStatus::Capped)
                    .await;
                return Ok(LoopOutcome {
                    response,
                    usage: cumulative,
                    capped: true,
                });
            }

            debug!(iteration, tool_calls = response.tool_calls.len(), "executing-tools");
            conversation.add_assistant(
                if response.content.is_empty() {
                    None
                } else {
                    Some(response.content.clone())
                },
                response.tool_calls.clone(),
            );

            let mut blocks = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                blocks.push(self.executor.execute(session_id, call).await);
            }
            conversation.add_tool_results(blocks);
        }

        unreachable!("max_iterations >= 1 guarantees the loop returns from within its body")
    }

    async fn finish(
        &self,
        session_id: SessionId,
        response: &ProviderResponse,
        usage: Usage,
        status: SessionStatus,
    ) {
        let patch = SessionPatch {
            final_output: Some(response.content.clone()),
            status: Some(status),
            token_usage: Some(json!({
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "total_tokens": usage.total_tokens,
            })),
            ..Default::default()
        };
        if let Err(e) = self.audit.update_session(session_id, patch).await {
            warn!(%session_id, error = %e, "failed to record session outcome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opsagent_audit::InMemoryAuditStorage;
    use opsagent_llm::{LlmError, LlmResult, Message, ProviderResponse, StopReason, StreamBox, ToolCall};
    use opsagent_tools::{Tool, ToolRegistry, ToolResult};
    use serde_json::Value;
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<ProviderResponse>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ProviderResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        async fn chat(&self, _messages: &[Message], _tools: &[NeutralToolDefinition]) -> LlmResult<ProviderResponse> {
            let mut responses = self.responses.lock().unwrap();
            Ok(responses.remove(0))
        }

        async fn stream_chat(&self, _messages: &[Message], _tools: &[NeutralToolDefinition]) -> LlmResult<StreamBox> {
            Err(LlmError::StreamingWithToolsUnsupported)
        }
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::success(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    fn text_response(content: &str) -> ProviderResponse {
        ProviderResponse {
            content: content.to_string(),
            tool_calls: Vec::new(),
            usage: Usage::new(10, 5),
            stop_reason: StopReason::Stop,
            model: "scripted-model".to_string(),
        }
    }

    fn tool_call_response(id: &str) -> ProviderResponse {
        ProviderResponse {
            content: String::new(),
            tool_calls: vec![ToolCall::new(id, "echo", serde_json::json!({"text": "hi"}))],
            usage: Usage::new(10, 5),
            stop_reason: StopReason::ToolUse,
            model: "scripted-model".to_string(),
        }
    }

    fn executor(audit: Arc<dyn AuditStorage>) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        ToolExecutor::new(Arc::new(registry), audit)
    }

    #[tokio::test]
    async fn no_tool_chat_terminates_in_one_iteration() {
        let audit: Arc<dyn AuditStorage> = Arc::new(InMemoryAuditStorage::new());
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("hi")]));
        let agent_loop = AgentLoop::new(provider, executor(audit.clone()), audit.clone(), Vec::new());
        let session_id = SessionId::new();

        let outcome = agent_loop.run(session_id, "hello").await.unwrap();
        assert_eq!(outcome.response.content, "hi");
        assert!(!outcome.capped);

        let session = audit.get_session(session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(audit.get_session_tool_calls(session_id).await.is_empty());
    }

    #[tokio::test]
    async fn tool_call_then_text_runs_two_iterations() {
        let audit: Arc<dyn AuditStorage> = Arc::new(InMemoryAuditStorage::new());
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("call_1"),
            text_response("3 days"),
        ]));
        let agent_loop = AgentLoop::new(provider, executor(audit.clone()), audit.clone(), Vec::new());
        let session_id = SessionId::new();

        let outcome = agent_loop.run(session_id, "uptime of host X").await.unwrap();
        assert_eq!(outcome.response.content, "3 days");
        assert!(!outcome.capped);
        assert_eq!(audit.get_session_tool_calls(session_id).await.len(), 1);
    }

    #[tokio::test]
    async fn pathological_provider_is_capped_with_final_turn_unexecuted() {
        let audit: Arc<dyn AuditStorage> = Arc::new(InMemoryAuditStorage::new());
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response("call_1"),
            tool_call_response("call_2"),
            tool_call_response("call_3"),
        ]));
        let agent_loop = AgentLoop::with_max_iterations(
            provider,
            executor(audit.clone()),
            audit.clone(),
            Vec::new(),
            3,
        );
        let session_id = SessionId::new();

        let outcome = agent_loop.run(session_id, "do it forever").await.unwrap();
        assert!(outcome.capped);
        assert_eq!(outcome.response.stop_reason, StopReason::ToolUse);
        assert!(!outcome.response.tool_calls.is_empty());

        // the third (capping) turn's tool call was never handed to the executor
        assert_eq!(audit.get_session_tool_calls(session_id).await.len(), 2);
        let session = audit.get_session(session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Capped);
    }
}
