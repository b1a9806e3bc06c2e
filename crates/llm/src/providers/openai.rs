//! OpenAI chat completions with function calling.
//!
//! Also serves Ollama, whose `/v1/chat/completions` endpoint speaks the same
//! dialect. Each turn is one non-streaming request; the answer is replayed as
//! [`StreamEvent`]s for the agentic loop.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use nbx_tool_runtime::{
    conversation::ConversationMessage,
    provider::{EventStream, LlmError, ToolAwareLlmProvider},
    stream::{StopReason, StreamEvent},
    tool::ToolDefinition,
};

use super::{error_for_status, replay};

pub struct OpenAiToolProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    name: &'static str,
}

impl OpenAiToolProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: "openai",
        }
    }

    /// Point at a local Ollama server's OpenAI-compatible endpoint.
    pub fn ollama(api_key: String, model: String, ollama_url: String) -> Self {
        Self {
            name: "ollama",
            ..Self::new(api_key, model, ollama_url)
        }
    }

    fn request_body(
        &self,
        messages: &[ConversationMessage],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
        temperature: f32,
        max_tokens: u32,
    ) -> Value {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            api_messages.push(json!({"role": "system", "content": system}));
        }
        api_messages.extend(messages.iter().map(message_to_openai));

        let mut body = json!({
            "model": self.model,
            "messages": api_messages,
        });

        if self.name == "ollama" {
            body["max_tokens"] = json!(max_tokens);
        } else if is_reasoning_model(&self.model) {
            // Hidden reasoning tokens count against this budget too.
            body["max_completion_tokens"] = json!(max_tokens.max(REASONING_MIN_COMPLETION_TOKENS));
        } else {
            body["max_completion_tokens"] = json!(max_tokens);
        }
        if !is_reasoning_model(&self.model) {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools.iter().map(tool_definition_to_openai).collect::<Vec<_>>());
        }
        body
    }
}

/// Floor for `max_completion_tokens` on reasoning models.
const REASONING_MIN_COMPLETION_TOKENS: u32 = 16_384;

/// Reasoning models reject any temperature but the default.
fn is_reasoning_model(model: &str) -> bool {
    ["gpt-5", "o1", "o3", "o4"]
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

fn tool_definition_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

fn message_to_openai(msg: &ConversationMessage) -> Value {
    match msg {
        ConversationMessage::User(text) => json!({
            "role": "user",
            "content": text,
        }),
        ConversationMessage::Assistant(content) => {
            let mut message = json!({
                "role": "assistant",
                "content": content.text,
            });
            if !content.tool_calls.is_empty() {
                message["tool_calls"] = content
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.input.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            message
        }
        ConversationMessage::ToolResult(result) => json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id,
            "content": result.content,
        }),
    }
}

/// Turn a chat completion body into the events of one assistant turn.
fn completion_to_events(resp: &Value) -> Result<Vec<StreamEvent>, LlmError> {
    let choice = resp["choices"]
        .get(0)
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0]".into()))?;
    let message = &choice["message"];
    let mut events = Vec::new();

    if let Some(text) = message["content"].as_str() {
        if !text.is_empty() {
            events.push(StreamEvent::TextDelta {
                text: text.to_string(),
            });
        }
    }

    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().unwrap_or_default().to_string();
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse("tool call without a name".into()))?
                .to_string();
            // Arguments arrive as a JSON-encoded string; some servers send an object.
            let arguments = match &call["function"]["arguments"] {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            events.push(StreamEvent::ToolCallStart { id: id.clone(), name });
            events.push(StreamEvent::ToolCallDelta {
                id: id.clone(),
                arguments_delta: arguments,
            });
            events.push(StreamEvent::ToolCallEnd { id });
        }
    }

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    };
    events.push(StreamEvent::MessageEnd { stop_reason });
    Ok(events)
}

#[async_trait]
impl ToolAwareLlmProvider for OpenAiToolProvider {
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.request_body(
            &messages,
            system_prompt.as_deref(),
            &tools,
            temperature,
            max_tokens,
        );

        debug!(provider = self.name, model = %self.model, url = %url, "chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(response).await);
        }

        let resp: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(replay(completion_to_events(&resp)?))
    }

    fn provider_name(&self) -> &str {
        self.name
    }
}
