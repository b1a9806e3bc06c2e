use crate::tool::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// A message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConversationMessage {
    /// User's text input
    User(String),
    /// Assistant's response (may contain text and/or tool calls)
    Assistant(AssistantContent),
    /// Result of a tool execution
    ToolResult(ToolResult),
}

/// Content from the assistant that can contain mixed text and tool calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantContent {
    /// Text blocks in the response
    pub text: Option<String>,
    /// Tool calls requested by the assistant
    pub tool_calls: Vec<ToolCall>,
}

/// Manages conversation history with context window awareness.
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    /// Maximum approximate token count before truncation
    max_tokens: usize,
    /// System prompt (always retained)
    system_prompt: Option<String>,
}

impl Conversation {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_tokens,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn add_user_message(&mut self, text: String) {
        self.messages.push(ConversationMessage::User(text));
        self.maybe_truncate();
    }

    pub fn add_assistant_response(&mut self, content: AssistantContent) {
        self.messages.push(ConversationMessage::Assistant(content));
        self.maybe_truncate();
    }

    pub fn add_tool_result(&mut self, result: ToolResult) {
        self.messages.push(ConversationMessage::ToolResult(result));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// The most recent non-empty assistant text, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            ConversationMessage::Assistant(content) => content
                .text
                .as_deref()
                .filter(|t| !t.trim().is_empty()),
            _ => None,
        })
    }

    /// Approximate token count using character count / 4 heuristic.
    pub fn approximate_tokens(&self) -> usize {
        let char_count: usize = self
            .messages
            .iter()
            .map(|m| match m {
                ConversationMessage::User(text) => text.len(),
                ConversationMessage::Assistant(content) => {
                    content.text.as_ref().map_or(0, |t| t.len())
                        + content
                            .tool_calls
                            .iter()
                            .map(|tc| tc.input.to_string().len())
                            .sum::<usize>()
                }
                ConversationMessage::ToolResult(result) => result.content.len(),
            })
            .sum();
        char_count / 4
    }

    /// Drop oldest messages when over the token limit, never the opening
    /// user message (it carries the task) and never the current turn.
    ///
    /// An assistant turn goes together with the tool results that answer it,
    /// so no result is ever left without its call.
    fn maybe_truncate(&mut self) {
        while self.approximate_tokens() > self.max_tokens && self.messages.len() > 3 {
            self.messages.remove(1);
            while matches!(self.messages.get(1), Some(ConversationMessage::ToolResult(_)))
                && self.messages.len() > 2
            {
                self.messages.remove(1);
            }
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(100_000) // 100k tokens default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_with_tool_calls() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message("Check devices in site=NYC".to_string());
        conv.add_assistant_response(AssistantContent {
            text: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "netbox_get_objects".to_string(),
                input: serde_json::json!({"object_type": "devices"}),
            }],
        });
        conv.add_tool_result(ToolResult {
            tool_call_id: "call_1".to_string(),
            content: "[]".to_string(),
            is_error: false,
        });

        assert_eq!(conv.messages().len(), 3);
        assert_eq!(conv.last_assistant_text(), None);
    }

    #[test]
    fn test_last_assistant_text_skips_blank_turns() {
        let mut conv = Conversation::default();
        conv.add_user_message("task".to_string());
        conv.add_assistant_response(AssistantContent {
            text: Some("first look".to_string()),
            tool_calls: vec![],
        });
        conv.add_assistant_response(AssistantContent {
            text: Some("   ".to_string()),
            tool_calls: vec![],
        });
        assert_eq!(conv.last_assistant_text(), Some("first look"));
    }

    fn tool_turn(id: &str) -> AssistantContent {
        AssistantContent {
            text: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: "netbox_get_objects".to_string(),
                input: serde_json::json!({"object_type": "dcim.device"}),
            }],
        }
    }

    #[test]
    fn test_truncation_drops_tool_results_with_their_call() {
        let mut conv = Conversation::new(50);
        conv.add_user_message("Check devices in site=DM-Akron".to_string());
        conv.add_assistant_response(tool_turn("c1"));
        conv.add_tool_result(ToolResult {
            tool_call_id: "c1".to_string(),
            content: "x".repeat(400),
            is_error: false,
        });
        conv.add_assistant_response(tool_turn("c2"));

        let messages = conv.messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], ConversationMessage::User(_)));
        assert!(matches!(
            &messages[1],
            ConversationMessage::Assistant(content) if content.tool_calls[0].id == "c2"
        ));
    }

    #[test]
    fn test_truncation_never_orphans_a_result() {
        let mut conv = Conversation::new(60);
        conv.add_user_message("task".to_string());
        for i in 0..10 {
            let id = format!("c{i}");
            conv.add_assistant_response(tool_turn(&id));
            conv.add_tool_result(ToolResult {
                tool_call_id: id,
                content: "y".repeat(120),
                is_error: false,
            });
        }
        conv.add_assistant_response(AssistantContent {
            text: Some("## Status: PASS".to_string()),
            tool_calls: vec![],
        });

        let mut open_calls: Vec<&str> = Vec::new();
        for message in conv.messages() {
            match message {
                ConversationMessage::Assistant(content) => {
                    open_calls = content.tool_calls.iter().map(|c| c.id.as_str()).collect();
                }
                ConversationMessage::ToolResult(result) => {
                    assert!(open_calls.contains(&result.tool_call_id.as_str()));
                }
                ConversationMessage::User(_) => {}
            }
        }
        assert!(matches!(&conv.messages()[1], ConversationMessage::Assistant(_)));
    }

    #[test]
    fn test_truncation_keeps_task_message() {
        let mut conv = Conversation::new(10); // Very small limit (~40 chars)
        conv.add_user_message("the original task".to_string());
        for i in 0..50 {
            conv.add_assistant_response(AssistantContent {
                text: Some(format!("This is a longer message number {} with padding text", i)),
                tool_calls: vec![],
            });
        }
        assert!(conv.messages().len() <= 4);
        assert!(matches!(
            &conv.messages()[0],
            ConversationMessage::User(text) if text == "the original task"
        ));
    }
}
