//! Google Gemini provider: vendor B, "function-declaration style".
//! Tool schemas move `input_schema` to `parameters` and are grouped
//! under a single tool wrapper; tool-call arguments are normalized
//! through [`crate::normalize`] since this vendor's SDK surfaces them
//! as a protobuf `Struct` tree rather than plain JSON.

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

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini provider.
pub struct GeminiProvider {
    client: Client,
    config: ProviderHttpConfig,
}

impl GeminiProvider {
    /// Builds a provider over a resolved HTTP configuration.
    #[must_use]
    pub fn new(config: ProviderHttpConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL);
        format!(
            "{base}/{model}:{method}?key={key}",
            model = self.config.model,
            key = self.config.api_key
        )
    }

    fn stream_endpoint(&self) -> String {
        format!("{}&alt=sse", self.endpoint("streamGenerateContent"))
    }

    /// Builds `contents` plus an optional `system_instruction`,
    /// mirroring the reference converter's "skip system, merge
    /// tool-results as a function-role content" behavior.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        for message in messages {
            match message {
                Message::System { content } => system_instruction = Some(content.clone()),
                Message::User { content } => {
                    contents.push(json!({"role": "user", "parts": [{"text": content}]}));
                },
                Message::Assistant { content, tool_calls } => {
                    let mut parts: Vec<Value> = Vec::new();
                    if let Some(text) = content {
                        if !text.is_empty() {
                            parts.push(json!({"text": text}));
                        }
                    }
                    for call in tool_calls {
                        parts.push(json!({
                            "functionCall": {"name": call.name, "args": call.arguments},
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(json!({"role": "model", "parts": parts}));
                    }
                },
                Message::ToolResult { blocks } => {
                    let parts: Vec<Value> = blocks
                        .iter()
                        .map(|b| {
                            json!({
                                "functionResponse": {
                                    "name": b.tool_call_id,
                                    "response": {"result": b.content},
                                },
                            })
                        })
                        .collect();
                    contents.push(json!({"role": "function", "parts": parts}));
                },
            }
        }

        (system_instruction, contents)
    }

    fn convert_tools(tools: &[NeutralToolDefinition]) -> Vec<Value> {
        if tools.is_empty() {
            return Vec::new();
        }
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                })
            })
            .collect();
        vec![json!({"functionDeclarations": declarations})]
    }

    fn parse_response(&self, response: &ApiResponse) -> ProviderResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut finish_reason = None;

        if let Some(candidate) = response.candidates.first() {
            finish_reason = candidate.finish_reason.clone();
            if let Some(parts) = candidate.content.as_ref().map(|c| &c.parts) {
                for part in parts {
                    if let Some(text) = &part.text {
                        content.push_str(text);
                    }
                    if let Some(call) = &part.function_call {
                        let id = format!("call_{}_{}", call.name, tool_calls.len());
                        tool_calls.push(ToolCall::new(
                            id,
                            call.name.clone(),
                            normalize_arguments(&call.args),
                        ));
                    }
                }
            }
        }

        let mut stop_reason = match finish_reason.as_deref() {
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some("SAFETY") => StopReason::Safety,
            _ => StopReason::Stop,
        };
        if !tool_calls.is_empty() {
            stop_reason = StopReason::ToolUse;
        }

        let usage = response
            .usage_metadata
            .as_ref()
            .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        ProviderResponse {
            content,
            tool_calls,
            usage,
            stop_reason,
            model: self.config.model.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[NeutralToolDefinition],
    ) -> LlmResult<ProviderResponse> {
        let (system_instruction, contents) = Self::convert_messages(messages);

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.config.max_tokens,
                "temperature": self.config.temperature,
            },
        });
        if let Some(system) = system_instruction {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        let tool_decls = Self::convert_tools(tools);
        if !tool_decls.is_empty() {
            body["tools"] = Value::Array(tool_decls);
        }

        debug!(model = %self.config.model, "sending gemini request");

        let response = self
            .client
            .post(self.endpoint("generateContent"))
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
            error!(status, %body, "gemini api error");
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

        let (system_instruction, contents) = Self::convert_messages(messages);
        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.config.max_tokens,
                "temperature": self.config.temperature,
            },
        });
        if let Some(system) = system_instruction {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        debug!(model = %self.config.model, "sending gemini streaming request");

        let response = self
            .client
            .post(self.stream_endpoint())
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
            error!(status, %body, "gemini api error");
            return Err(LlmError::ApiError {
                provider: "gemini".to_string(),
                status,
                body,
            });
        }

        let stream = try_stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes_stream.next().await {
                let chunk = chunk.map_err(|source| LlmError::Transport {
                    provider: "gemini".to_string(),
                    source,
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(event_end) = buffer.find("\n\n") {
                    let event_data = buffer[..event_end].to_string();
                    let rest_start = event_end + 2;
                    buffer = buffer[rest_start..].to_string();

                    for line in event_data.lines() {
                        let Some(data) = line.strip_prefix("data: ") else { continue };
                        let Ok(event) = serde_json::from_str::<ApiResponse>(data) else { continue };

                        if let Some(candidate) = event.candidates.first() {
                            if let Some(parts) = candidate.content.as_ref().map(|c| &c.parts) {
                                for part in parts {
                                    if let Some(text) = &part.text {
                                        if !text.is_empty() {
                                            yield StreamEvent::Chunk { content: text.clone() };
                                        }
                                    }
                                }
                            }
                        }

                        if let Some(usage) = &event.usage_metadata {
                            yield StreamEvent::End {
                                usage: Some(Usage::new(usage.prompt_token_count, usage.candidates_token_count)),
                            };
                        }
                    }
                }
            }

            yield StreamEvent::End { usage: None };
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderHttpConfig {
        ProviderHttpConfig {
            api_key: "test-key".to_string(),
            model: "gemini-2.0-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            base_url: None,
        }
    }

    #[test]
    fn system_message_becomes_system_instruction_not_a_content_entry() {
        let messages = vec![
            Message::System { content: "be terse".to_string() },
            Message::user("hi"),
        ];
        let (system, contents) = GeminiProvider::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(contents.len(), 1);
    }

    #[test]
    fn tool_result_becomes_function_role_content() {
        let messages = vec![Message::tool_results(vec![
            crate::types::ToolResultBlock::success("call_1", "up 3 days"),
        ])];
        let (_, contents) = GeminiProvider::convert_messages(&messages);
        assert_eq!(contents[0]["role"], "function");
    }

    #[test]
    fn response_with_struct_value_args_is_normalized() {
        let provider = GeminiProvider::new(config());
        let raw = json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "functionCall": {
                            "name": "ssh_exec",
                            "args": {"struct_value": {"fields": {"host": {"string_value": "db-1"}}}},
                        },
                    }],
                },
                "finishReason": "STOP",
            }],
        });
        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        let normalized = provider.parse_response(&parsed);
        assert_eq!(normalized.stop_reason, StopReason::ToolUse);
        assert_eq!(normalized.tool_calls[0].arguments, json!({"host": "db-1"}));
    }
}
