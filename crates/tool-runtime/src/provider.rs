use crate::conversation::ConversationMessage;
use crate::stream::StreamEvent;
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Boxed stream of provider events for one model turn.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Trait for LLM providers that support tool use.
///
/// This trait lives in tool-runtime (not in crates/llm) because it's
/// defined by the consumer (the agentic loop), not the provider.
/// Implementations live in crates/llm.
#[async_trait]
pub trait ToolAwareLlmProvider: Send + Sync {
    /// Produce one assistant turn with tool definitions available.
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<EventStream, LlmError>;

    /// Provider name for logging/debugging (e.g., "openai", "anthropic", "ollama")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Authentication failed")]
    AuthError,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Mock LLM provider for testing the agentic loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::stream::StopReason;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One request as seen by the mock, for assertions.
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub messages: Vec<ConversationMessage>,
        pub system_prompt: Option<String>,
        pub tool_names: Vec<String>,
    }

    /// A mock provider that returns pre-configured responses in FIFO order.
    ///
    /// When the queue runs dry it keeps requesting the `fallback` response,
    /// which by default is an empty end-of-turn.
    pub struct MockLlmProvider {
        responses: Mutex<VecDeque<Result<Vec<StreamEvent>, String>>>,
        fallback: Mutex<Option<Vec<StreamEvent>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockLlmProvider {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queue a response that will be returned after those already queued.
        pub fn queue_response(&self, events: Vec<StreamEvent>) {
            self.responses.lock().unwrap().push_back(Ok(events));
        }

        /// Queue a simple text response.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(text_turn(text));
        }

        /// Queue a turn consisting of a single tool call.
        pub fn queue_tool_call(&self, id: &str, name: &str, arguments: serde_json::Value) {
            self.queue_response(tool_call_turn(id, name, arguments));
        }

        /// Queue a provider failure (surfaces as `LlmError::NetworkError`).
        pub fn queue_error(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
        }

        /// Response used once the queue is empty.
        pub fn set_fallback(&self, events: Vec<StreamEvent>) {
            *self.fallback.lock().unwrap() = Some(events);
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for MockLlmProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    pub fn text_turn(text: &str) -> Vec<StreamEvent> {
        vec![
            StreamEvent::TextDelta {
                text: text.to_string(),
            },
            StreamEvent::MessageEnd {
                stop_reason: StopReason::EndTurn,
            },
        ]
    }

    pub fn tool_call_turn(id: &str, name: &str, arguments: serde_json::Value) -> Vec<StreamEvent> {
        vec![
            StreamEvent::ToolCallStart {
                id: id.to_string(),
                name: name.to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: id.to_string(),
                arguments_delta: arguments.to_string(),
            },
            StreamEvent::ToolCallEnd { id: id.to_string() },
            StreamEvent::MessageEnd {
                stop_reason: StopReason::ToolUse,
            },
        ]
    }

    #[async_trait]
    impl ToolAwareLlmProvider for MockLlmProvider {
        async fn stream_with_tools(
            &self,
            messages: Vec<ConversationMessage>,
            system_prompt: Option<String>,
            tools: Vec<ToolDefinition>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<EventStream, LlmError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                messages,
                system_prompt,
                tool_names: tools.into_iter().map(|t| t.name).collect(),
            });

            let next = self.responses.lock().unwrap().pop_front();
            let events = match next {
                Some(Ok(events)) => events,
                Some(Err(message)) => return Err(LlmError::NetworkError(message)),
                None => self.fallback.lock().unwrap().clone().unwrap_or_else(|| {
                    vec![StreamEvent::MessageEnd {
                        stop_reason: StopReason::EndTurn,
                    }]
                }),
            };
            Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}
