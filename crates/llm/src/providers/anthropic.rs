//! Anthropic Messages API with tool use.

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

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicToolProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicToolProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
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
        let mut body = json!({
            "model": self.model,
            "messages": messages_to_claude(messages),
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools.iter().map(tool_definition_to_claude).collect::<Vec<_>>());
        }
        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }
        body
    }
}

fn tool_definition_to_claude(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

/// Translate the history. Consecutive tool results are folded into a single
/// user message, since the API expects strictly alternating roles.
fn messages_to_claude(messages: &[ConversationMessage]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(messages.len());
    let mut pending_results: Vec<Value> = Vec::new();

    for msg in messages {
        if let ConversationMessage::ToolResult(result) = msg {
            pending_results.push(json!({
                "type": "tool_result",
                "tool_use_id": result.tool_call_id,
                "content": result.content,
                "is_error": result.is_error,
            }));
            continue;
        }
        if !pending_results.is_empty() {
            out.push(json!({"role": "user", "content": std::mem::take(&mut pending_results)}));
        }
        out.push(message_to_claude(msg));
    }
    if !pending_results.is_empty() {
        out.push(json!({"role": "user", "content": pending_results}));
    }
    out
}

fn message_to_claude(msg: &ConversationMessage) -> Value {
    match msg {
        ConversationMessage::User(text) => json!({
            "role": "user",
            "content": text,
        }),
        ConversationMessage::Assistant(content) => {
            let mut blocks: Vec<Value> = Vec::new();
            if let Some(text) = &content.text {
                blocks.push(json!({"type": "text", "text": text}));
            }
            for tc in &content.tool_calls {
                blocks.push(json!({
                    "type": "tool_use",
                    "id": tc.id,
                    "name": tc.name,
                    "input": tc.input,
                }));
            }
            json!({
                "role": "assistant",
                "content": blocks,
            })
        }
        ConversationMessage::ToolResult(result) => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": result.tool_call_id,
                "content": result.content,
                "is_error": result.is_error,
            }],
        }),
    }
}

fn message_to_events(resp: &Value) -> Result<Vec<StreamEvent>, LlmError> {
    let blocks = resp["content"]
        .as_array()
        .ok_or_else(|| LlmError::InvalidResponse("missing content array".into()))?;
    let mut events = Vec::new();

    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                    events.push(StreamEvent::TextDelta {
                        text: text.to_string(),
                    });
                }
            }
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default().to_string();
                let name = block["name"]
                    .as_str()
                    .ok_or_else(|| LlmError::InvalidResponse("tool_use without a name".into()))?
                    .to_string();
                events.push(StreamEvent::ToolCallStart { id: id.clone(), name });
                events.push(StreamEvent::ToolCallDelta {
                    id: id.clone(),
                    arguments_delta: block["input"].to_string(),
                });
                events.push(StreamEvent::ToolCallEnd { id });
            }
            _ => {}
        }
    }

    let stop_reason = match resp["stop_reason"].as_str() {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    };
    events.push(StreamEvent::MessageEnd { stop_reason });
    Ok(events)
}

#[async_trait]
impl ToolAwareLlmProvider for AnthropicToolProvider {
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(
            &messages,
            system_prompt.as_deref(),
            &tools,
            temperature,
            max_tokens,
        );

        debug!(model = %self.model, url = %url, "messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let resp: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(replay(message_to_events(&resp)?))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}
