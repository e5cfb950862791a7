//! OpenAI-compatible LLM provider: vendor C, "function-calling style".
//!
//! Covers Zhipu/GLM, OpenAI itself, and any other endpoint speaking the
//! `{role, content, tool_calls}` / `{type: "function", function: {...}}`
//! dialect. Arguments travel as a JSON-encoded string on the wire in
//! both directions; [`crate::normalize::normalize_arguments`] handles
//! the parse (and its documented fallback) on the way in.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::error::{LlmError, LlmResult};
use crate::normalize::normalize_arguments;
use crate::provider::{LlmProvider, ProviderHttpConfig, StreamBox};
use crate::types::{
    Message, NeutralToolDefinition, ProviderResponse, StopReason, StreamEvent, ToolCall, Usage,
};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible provider. Works against OpenAI, Zhipu/GLM, or any
/// other endpoint speaking the same dialect, selected by base URL.
pub struct OpenAiCompatProvider {
    client: Client,
    config: ProviderHttpConfig,
    provider_label: String,
}

impl OpenAiCompatProvider {
    /// Builds a provider over a resolved HTTP configuration, labeled
    /// with the configured provider name (`"openai"`, `"zhipu"`, ...)
    /// for error messages and logging.
    #[must_use]
    pub fn new(config: ProviderHttpConfig, provider_label: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            provider_label: provider_label.into(),
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[NeutralToolDefinition],
        stream: bool,
    ) -> Value {
        let api_messages: Vec<Value> = messages.iter().flat_map(Self::convert_message).collect();

        let mut request = json!({
            "model": self.config.model,
            "messages": api_messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": stream,
        });

        if !tools.is_empty() {
            let api_tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    let mut parameters = t.input_schema.clone();
                    if let Some(obj) = parameters.as_object_mut() {
                        obj.entry("properties").or_insert_with(|| json!({}));
                    }
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": parameters,
                        },
                    })
                })
                .collect();
            request["tools"] = Value::Array(api_tools);
        }

        request
    }

    /// Converts one neutral message into zero or more API messages.
    /// A single tool-result batch explodes into one `{role: "tool"}`
    /// message per block, since this dialect addresses each result by
    /// its own `tool_call_id` rather than carrying a batch.
    fn convert_message(message: &Message) -> Vec<Value> {
        match message {
            Message::System { content } => vec![json!({"role": "system", "content": content})],
            Message::User { content } => vec![json!({"role": "user", "content": content})],
            Message::Assistant { content, tool_calls } => {
                if tool_calls.is_empty() {
                    return vec![json!({
                        "role": "assistant",
                        "content": content.clone().unwrap_or_default(),
                    })];
                }
                let api_tool_calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": serde_json::to_string(&call.arguments)
                                    .unwrap_or_default(),
                            },
                        })
                    })
                    .collect();
                vec![json!({
                    "role": "assistant",
                    "content": content.clone(),
                    "tool_calls": api_tool_calls,
                })]
            },
            Message::ToolResult { blocks } => blocks
                .iter()
                .map(|block| {
                    json!({
                        "role": "tool",
                        "tool_call_id": block.tool_call_id,
                        "content": block.content,
                    })
                })
                .collect(),
        }
    }

    fn parse_response(&self, response: &ApiResponse) -> ProviderResponse {
        let choice = response.choices.first();
        let message = choice.map(|c| &c.message);

        let content = message.and_then(|m| m.content.clone()).unwrap_or_default();
        let tool_calls: Vec<ToolCall> = message
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                ToolCall::new(
                    raw.id,
                    raw.function.name,
                    normalize_arguments(&Value::String(raw.function.arguments)),
                )
            })
            .collect();

        let mut stop_reason = match choice.and_then(|c| c.finish_reason.as_deref()) {
            Some("length") => StopReason::MaxTokens,
            Some("content_filter") => StopReason::Safety,
            Some("tool_calls") => StopReason::ToolUse,
            _ => StopReason::Stop,
        };
        if !tool_calls.is_empty() {
            stop_reason = StopReason::ToolUse;
        }

        let usage = response
            .usage
            .as_ref()
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        ProviderResponse {
            content,
            tool_calls,
            usage,
            stop_reason,
            model: self.config.model.clone(),
        }
    }

    fn auth_header(&self) -> Option<String> {
        if self.config.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.config.api_key))
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.provider_label
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

        debug!(provider = %self.provider_label, model = %self.config.model, "sending openai-compat request");

        let mut request = self.client.post(url).json(&body);
        if let Some(auth) = self.auth_header() {
            request = request.header("authorization", auth);
        }

        let response = request.send().await.map_err(|source| LlmError::Transport {
            provider: self.provider_label.clone(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(provider = %self.provider_label, status, %body, "openai-compat api error");
            return Err(LlmError::ApiError {
                provider: self.provider_label.clone(),
                status,
                body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|source| LlmError::InvalidResponse {
                provider: self.provider_label.clone(),
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

        let mut request = self.client.post(url).json(&body);
        if let Some(auth) = self.auth_header() {
            request = request.header("authorization", auth);
        }

        let response = request.send().await.map_err(|source| LlmError::Transport {
            provider: self.provider_label.clone(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                provider: self.provider_label.clone(),
                status,
                body,
            });
        }

        let provider_label = self.provider_label.clone();
        let stream = try_stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes_stream.next().await {
                let chunk = chunk.map_err(|source| LlmError::Transport {
                    provider: provider_label.clone(),
                    source,
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    if data == "[DONE]" {
                        yield StreamEvent::End { usage: None };
                        continue;
                    }
                    let Ok(chunk_event) = serde_json::from_str::<StreamChunk>(data) else { continue };
                    if let Some(choice) = chunk_event.choices.first() {
                        if let Some(text) = &choice.delta.content {
                            if !text.is_empty() {
                                yield StreamEvent::Chunk { content: text.clone() };
                            }
                        }
                    }
                    if let Some(usage) = chunk_event.usage {
                        yield StreamEvent::End {
                            usage: Some(Usage::new(usage.prompt_tokens, usage.completion_tokens)),
                        };
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawToolCall {
    id: String,
    function: RawFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderHttpConfig {
        ProviderHttpConfig {
            api_key: "test-key".to_string(),
            model: "glm-4-plus".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            base_url: None,
        }
    }

    #[test]
    fn tool_result_batch_explodes_into_one_message_per_block() {
        let provider = OpenAiCompatProvider::new(config(), "zhipu");
        let messages = vec![Message::tool_results(vec![
            crate::types::ToolResultBlock::success("call_1", "ok"),
            crate::types::ToolResultBlock::success("call_2", "also ok"),
        ])];
        let request = provider.build_request(&messages, &[], false);
        let api_messages = request["messages"].as_array().unwrap();
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0]["role"], "tool");
        assert_eq!(api_messages[0]["tool_call_id"], "call_1");
        assert_eq!(api_messages[1]["tool_call_id"], "call_2");
    }

    #[test]
    fn tool_schema_gets_empty_properties_object_when_absent() {
        let provider = OpenAiCompatProvider::new(config(), "zhipu");
        let tools = vec![NeutralToolDefinition {
            name: "noop".to_string(),
            description: "does nothing".to_string(),
            input_schema: json!({"type": "object"}),
        }];
        let request = provider.build_request(&[], &tools, false);
        let schema = &request["tools"][0]["function"]["parameters"];
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn string_encoded_arguments_round_trip_through_normalize() {
        let provider = OpenAiCompatProvider::new(config(), "zhipu");
        let response = ApiResponse {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: None,
                    tool_calls: vec![RawToolCall {
                        id: "call_1".to_string(),
                        function: RawFunctionCall {
                            name: "ssh_exec".to_string(),
                            arguments: r#"{"host": "db-1", "command": "uptime"}"#.to_string(),
                        },
                    }],
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        };
        let normalized = provider.parse_response(&response);
        assert_eq!(normalized.stop_reason, StopReason::ToolUse);
        assert_eq!(
            normalized.tool_calls[0].arguments,
            json!({"host": "db-1", "command": "uptime"})
        );
    }
}
