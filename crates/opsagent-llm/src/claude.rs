//! Anthropic Claude provider: vendor A, "tool-use native". Tool schemas
//! pass through close to unchanged, wrapped in the vendor's tool
//! object; tool results travel as a `tool_result` content block inside
//! a user-role message, exactly the neutral representation
//! [`crate::conversation::Conversation`] already stores.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::error::{LlmError, LlmResult};
use crate::normalize::normalize_value;
use crate::provider::{LlmProvider, ProviderHttpConfig, StreamBox};
use crate::types::{
    Message, NeutralToolDefinition, ProviderResponse, StopReason, StreamEvent, ToolCall, Usage,
};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
pub struct ClaudeProvider {
    client: Client,
    config: ProviderHttpConfig,
}

impl ClaudeProvider {
    /// Builds a provider over a resolved HTTP configuration.
    #[must_use]
    pub fn new(config: ProviderHttpConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[NeutralToolDefinition],
        stream: bool,
    ) -> Value {
        let system = messages.iter().find_map(|m| match m {
            Message::System { content } => Some(content.clone()),
            _ => None,
        });

        let api_messages: Vec<Value> = messages
            .iter()
            .filter(|m| !matches!(m, Message::System { .. }))
            .map(Self::convert_message)
            .collect();

        let mut request = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": api_messages,
            "stream": stream,
        });

        if let Some(system) = system {
            request["system"] = Value::String(system);
        }

        if !tools.is_empty() {
            let api_tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            request["tools"] = Value::Array(api_tools);
        }

        request
    }

    fn convert_message(message: &Message) -> Value {
        match message {
            Message::System { .. } => unreachable!("system messages are filtered before conversion"),
            Message::User { content } => json!({"role": "user", "content": content}),
            Message::Assistant { content, tool_calls } => {
                let mut blocks: Vec<Value> = Vec::new();
                if let Some(text) = content {
                    if !text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                }
                for call in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                json!({"role": "assistant", "content": blocks})
            },
            Message::ToolResult { blocks } => {
                let content: Vec<Value> = blocks
                    .iter()
                    .map(|b| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": b.tool_call_id,
                            "content": b.content,
                            "is_error": b.is_error,
                        })
                    })
                    .collect();
                json!({"role": "user", "content": content})
            },
        }
    }

    fn parse_response(&self, response: &ApiResponse) -> ProviderResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in &response.content {
            match block {
                ContentBlock::Text { text } => content.push_str(text),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id.clone(), name.clone(), normalize_value(input)));
                },
            }
        }

        let mut stop_reason = match response.stop_reason.as_deref() {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("tool_use") => StopReason::ToolUse,
            _ => StopReason::Stop,
        };
        if !tool_calls.is_empty() {
            stop_reason = StopReason::ToolUse;
        }

        ProviderResponse {
            content,
            tool_calls,
            usage: Usage::new(response.usage.input_tokens, response.usage.output_tokens),
            stop_reason,
            model: self.config.model.clone(),
        }
    }

    fn api_key_header(&self) -> LlmResult<reqwest::header::HeaderValue> {
        let mut value = reqwest::header::HeaderValue::try_from(&self.config.api_key).map_err(|_| {
            LlmError::ApiError {
                provider: self.name().to_string(),
                status: 0,
                body: "API key contains characters invalid in an HTTP header".to_string(),
            }
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[NeutralToolDefinition],
    ) -> LlmResult<ProviderResponse> {
        let body = self.build_request(messages, tools, false);
        let url = self.config.base_url.as_deref().unwrap_or(DEFAULT_API_URL);

        debug!(model = %self.config.model, "sending claude request");

        let response = self
            .client
            .post(url)
            .header("x-api-key", self.api_key_header()?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|source| LlmError::Transport {
                provider: self.name().to_string(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, %body, "claude api error");
            return Err(LlmError::ApiError {
                provider: self.name().to_string(),
                status,
                body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|source| LlmError::InvalidResponse {
                provider: self.name().to_string(),
                source,
            })?;

        Ok(self.parse_response(&api_response))
    }

    async fn stream_chat(
        &self,
        messages: &[Message],
        tools: &[NeutralToolDefinition],
    ) -> LlmResult<StreamBox> {
        if !tools.is_empty() {
            return Err(LlmError::StreamingWithToolsUnsupported);
        }

        let body = self.build_request(messages, tools, true);
        let url = self.config.base_url.as_deref().unwrap_or(DEFAULT_API_URL);

        let response = self
            .client
            .post(url)
            .header("x-api-key", self.api_key_header()?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|source| LlmError::Transport {
                provider: self.name().to_string(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                provider: "claude".to_string(),
                status,
                body,
            });
        }

        let stream = try_stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes_stream.next().await {
                let chunk = chunk.map_err(|source| LlmError::Transport {
                    provider: "claude".to_string(),
                    source,
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(event_end) = buffer.find("\n\n") {
                    let event_data = buffer[..event_end].to_string();
                    let rest_start = event_end + 2;
                    buffer = buffer[rest_start..].to_string();

                    for line in event_data.lines() {
                        let Some(data) = line.strip_prefix("data: ") else { continue };
                        if data == "[DONE]" {
                            yield StreamEvent::End { usage: None };
                            continue;
                        }
                        let Ok(event) = serde_json::from_str::<StreamingEvent>(data) else { continue };
                        match event {
                            StreamingEvent::ContentBlockDelta { delta: Delta::TextDelta { text }, .. } => {
                                yield StreamEvent::Chunk { content: text };
                            },
                            StreamingEvent::MessageDelta { usage: Some(usage), .. } => {
                                yield StreamEvent::End {
                                    usage: Some(Usage::new(0, usage.output_tokens)),
                                };
                            },
                            StreamingEvent::MessageStop => {
                                yield StreamEvent::End { usage: None };
                            },
                            _ => {},
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)]
enum StreamingEvent {
    MessageStart { message: Value },
    ContentBlockStart { index: usize, content_block: Value },
    ContentBlockDelta { index: usize, delta: Delta },
    ContentBlockStop { index: usize },
    MessageDelta { delta: Value, usage: Option<DeltaUsage> },
    MessageStop,
    Ping,
    Error { error: Value },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct DeltaUsage {
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderHttpConfig {
        ProviderHttpConfig {
            api_key: "test-key".to_string(),
            model: "claude-sonnet-4".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            base_url: None,
        }
    }

    #[test]
    fn build_request_injects_system_as_dedicated_field() {
        let provider = ClaudeProvider::new(config());
        let messages = vec![
            Message::System { content: "be terse".to_string() },
            Message::user("hi"),
        ];
        let request = provider.build_request(&messages, &[], false);
        assert_eq!(request["system"], "be terse");
        assert_eq!(request["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn assistant_message_with_both_text_and_tool_calls_emits_both_blocks() {
        let provider = ClaudeProvider::new(config());
        let messages = vec![Message::assistant_with_tools(
            Some("checking".to_string()),
            vec![ToolCall::new("call_1", "ssh_exec", json!({"host": "a"}))],
        )];
        let request = provider.build_request(&messages, &[], false);
        let content = request["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "tool_use");
    }

    #[test]
    fn tool_use_stop_reason_wins_even_if_vendor_reports_generic_stop() {
        let provider = ClaudeProvider::new(config());
        let response = ApiResponse {
            content: vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "ssh_exec".to_string(),
                input: json!({}),
            }],
            stop_reason: Some("end_turn".to_string()),
            usage: ApiUsage { input_tokens: 10, output_tokens: 5 },
        };
        let normalized = provider.parse_response(&response);
        assert_eq!(normalized.stop_reason, StopReason::ToolUse);
        assert_eq!(normalized.usage.total_tokens, 15);
    }
}
