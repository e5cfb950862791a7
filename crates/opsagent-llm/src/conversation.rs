//! Conversation state (C6): an ordered message log with a fixed system
//! instruction, and typed helpers for each message variant.

use crate::types::{Message, ToolCall, ToolResultBlock};

/// The operator-persona system instruction injected at construction.
/// Swapping it is a configuration change, not a code change — callers
/// that want a different persona pass their own string to
/// [`Conversation::with_system_prompt`].
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an operations agent with direct access to a fleet of remote hosts through a bounded set of tools.

## Ground rules
1. Use tools to take action. Do not describe how an operator would run a command by hand — call the tool that runs it.
2. When a request names or implies a host, environment, or service, resolve it and call the appropriate tool rather than asking the user to do it themselves.
3. After a tool returns, read its output before replying; do not repeat the raw output back verbatim when a short summary will do.

## Available tools
- `ssh_exec` — runs one shell command on one host.
- `ssh_exec_batch` — runs one shell command across a list of hosts.

## Safety
- Some commands are gated by policy. A tool may answer with a pending confirmation: present the preview to the user, then re-invoke the same tool with the confirm token once they agree.
- A denied command is final for this turn; do not retry it with different phrasing. Explain the denial and suggest a safer alternative if one exists.
- Treat destructive operations (recursive deletes, filesystem formatting, service stops, batch actions across many hosts) with extra care, especially in production.

## Style
- Keep responses short. Lead with the answer, not the steps you took to get it.
- Call out command failures and non-zero exit codes explicitly; do not silently gloss over them.
- When a batch operation partially fails, report per-host results instead of a single pass/fail verdict."#;

/// Owns the growing message log for one agent-loop invocation.
///
/// The system message is never part of the stored log; it is
/// prepended by [`Conversation::get_messages`] so that every provider
/// conversion sees it at position 0, matching the data-model invariant
/// that exactly one system message exists and it is always first.
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    /// Builds a conversation using [`DEFAULT_SYSTEM_PROMPT`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_system_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    /// Builds a conversation with a caller-supplied system instruction.
    #[must_use]
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    /// Appends a user turn.
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Appends an assistant turn, with optional text and tool calls.
    pub fn add_assistant(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.messages
            .push(Message::assistant_with_tools(content, tool_calls));
    }

    /// Appends a tool-result batch answering the most recent assistant
    /// turn's tool calls.
    pub fn add_tool_results(&mut self, blocks: Vec<ToolResultBlock>) {
        self.messages.push(Message::tool_results(blocks));
    }

    /// Returns the full message log with the system message prepended
    /// at position 0 — the shape every vendor module consumes.
    #[must_use]
    pub fn get_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        out.push(Message::System {
            content: self.system_prompt.clone(),
        });
        out.extend(self.messages.iter().cloned());
        out
    }

    /// The system instruction alone, for providers that inject it
    /// through a dedicated field rather than as a leading message.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The message log without the system message, for providers that
    /// take it separately.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.messages
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_is_always_first_and_alone() {
        let mut conv = Conversation::new();
        conv.add_user("hello");
        conv.add_assistant(Some("hi".to_string()), Vec::new());
        let messages = conv.get_messages();
        assert!(matches!(messages[0], Message::System { .. }));
        assert_eq!(
            messages
                .iter()
                .filter(|m| matches!(m, Message::System { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn history_excludes_the_system_message() {
        let mut conv = Conversation::new();
        conv.add_user("hello");
        assert_eq!(conv.history().len(), 1);
        assert_eq!(conv.get_messages().len(), 2);
    }

    #[test]
    fn tool_result_batch_preserves_block_order() {
        let mut conv = Conversation::new();
        conv.add_assistant(
            None,
            vec![
                ToolCall::new("call_1", "ssh_exec", serde_json::json!({})),
                ToolCall::new("call_2", "ssh_exec", serde_json::json!({})),
            ],
        );
        conv.add_tool_results(vec![
            ToolResultBlock::success("call_1", "first"),
            ToolResultBlock::success("call_2", "second"),
        ]);
        let Message::ToolResult { blocks } = conv.get_messages().pop().unwrap() else {
            panic!("expected a tool-result message");
        };
        assert_eq!(blocks[0].tool_call_id, "call_1");
        assert_eq!(blocks[1].tool_call_id, "call_2");
    }
}
