use crate::conversation::{AssistantContent, Conversation};
use crate::provider::{LlmError, ToolAwareLlmProvider};
use crate::registry::ToolRegistry;
use crate::stream::{StopReason, StreamEvent};
use crate::tool::{ToolCall, ToolError, ToolResult};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The bounded agentic loop that orchestrates LLM ↔ Tool execution.
///
/// Flow: User → LLM → ToolCalls → Execute → Results → LLM → ... → Final Text
///
/// One iteration is one model turn plus the tool calls it requested. Tool
/// calls run one after another; a turn never overlaps the next.
pub struct AgenticLoop {
    provider: Arc<dyn ToolAwareLlmProvider>,
    registry: Arc<ToolRegistry>,
    max_iterations: usize,
    temperature: f32,
    max_tokens: u32,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Last non-empty assistant text (empty if the model never wrote any).
    pub final_text: String,
    /// Model turns taken.
    pub iterations: usize,
    /// Tool calls dispatched to the registry, including rejected ones.
    pub tool_calls: usize,
    /// `true` when the iteration ceiling stopped the run before a final answer.
    pub hit_limit: bool,
    /// Why the last model turn ended.
    pub stop_reason: StopReason,
}

impl AgenticLoop {
    pub fn new(provider: Arc<dyn ToolAwareLlmProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            max_iterations: 10,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run a single user message through the loop until the model stops
    /// asking for tools or the iteration ceiling is reached.
    ///
    /// Hitting the ceiling is not an error: the outcome carries whatever text
    /// the model produced so far with `hit_limit` set.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        user_message: String,
    ) -> Result<LoopOutcome, AgenticLoopError> {
        conversation.add_user_message(user_message);
        let mut iterations = 0;
        let mut dispatched = 0;
        let mut concluded = false;
        let mut last_stop = StopReason::EndTurn;

        while iterations < self.max_iterations {
            iterations += 1;
            debug!(iteration = iterations, "Starting agentic loop iteration");

            let mut stream = self
                .provider
                .stream_with_tools(
                    conversation.messages().to_vec(),
                    conversation.system_prompt().map(String::from),
                    self.registry.list(),
                    self.temperature,
                    self.max_tokens,
                )
                .await?;

            // Collect events from this turn
            let mut text_parts = Vec::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            // Ids of calls whose arguments were not valid JSON.
            let mut malformed: Vec<String> = Vec::new();
            let mut current_tool_args = String::new();
            let mut current_tool_id = String::new();
            let mut current_tool_name = String::new();
            let mut stop_reason = StopReason::EndTurn;

            while let Some(event_result) = stream.next().await {
                let event = event_result?;
                match &event {
                    StreamEvent::TextDelta { text } => {
                        text_parts.push(text.clone());
                    }
                    StreamEvent::ToolCallStart { id, name } => {
                        current_tool_id = id.clone();
                        current_tool_name = name.clone();
                        current_tool_args.clear();
                    }
                    StreamEvent::ToolCallDelta { arguments_delta, .. } => {
                        current_tool_args.push_str(arguments_delta);
                    }
                    StreamEvent::ToolCallEnd { .. } => {
                        let input = parse_arguments(&current_tool_args).unwrap_or_else(|e| {
                            debug!(tool = %current_tool_name, error = %e, "Unparseable tool arguments");
                            malformed.push(current_tool_id.clone());
                            serde_json::json!({})
                        });
                        tool_calls.push(ToolCall {
                            id: current_tool_id.clone(),
                            name: current_tool_name.clone(),
                            input,
                        });
                    }
                    StreamEvent::MessageEnd { stop_reason: reason } => {
                        stop_reason = reason.clone();
                    }
                    StreamEvent::Error { message } => {
                        warn!(message, "Stream error");
                    }
                }
            }

            let text = if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join(""))
            };
            conversation.add_assistant_response(AssistantContent {
                text,
                tool_calls: tool_calls.clone(),
            });

            if tool_calls.is_empty() {
                info!(iteration = iterations, ?stop_reason, "Agentic loop complete");
                last_stop = stop_reason;
                concluded = true;
                break;
            }
            last_stop = stop_reason;

            info!(count = tool_calls.len(), "Executing tool calls");
            for call in &tool_calls {
                dispatched += 1;
                let result = if malformed.contains(&call.id) {
                    ToolResult::error(&call.id, "Tool arguments were not valid JSON")
                } else {
                    self.execute_tool_call(call).await?
                };
                conversation.add_tool_result(result);
            }
        }

        if !concluded {
            warn!(
                max_iterations = self.max_iterations,
                "Iteration ceiling reached without a final answer"
            );
        }

        Ok(LoopOutcome {
            final_text: conversation
                .last_assistant_text()
                .unwrap_or_default()
                .to_string(),
            iterations,
            tool_calls: dispatched,
            hit_limit: !concluded,
            stop_reason: last_stop,
        })
    }

    /// Execute one call. Non-fatal failures become error results for the
    /// model; transport failures abort the run.
    async fn execute_tool_call(&self, call: &ToolCall) -> Result<ToolResult, AgenticLoopError> {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unavailable tool");
            return Ok(ToolResult::error(
                &call.id,
                format!("Unknown tool: {}", call.name),
            ));
        };

        match tool.execute(call.input.clone()).await {
            Ok(mut result) => {
                result.tool_call_id = call.id.clone();
                Ok(result)
            }
            Err(e) if e.is_fatal() => Err(AgenticLoopError::Tool {
                name: call.name.clone(),
                source: e,
            }),
            Err(e) => {
                debug!(tool = %call.name, error = %e, "Tool call failed");
                Ok(ToolResult::error(&call.id, format!("Tool error: {}", e)))
            }
        }
    }
}

/// Empty argument strings mean "no arguments".
fn parse_arguments(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
}

#[derive(Debug, thiserror::Error)]
pub enum AgenticLoopError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),
    #[error("Tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },
}
