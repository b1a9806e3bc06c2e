//! Provider-agnostic agentic loop for tool-using LLM sessions.
//!
//! The loop owns nothing but the turn bound: tools come from a
//! [`ToolRegistry`], model turns from a [`ToolAwareLlmProvider`].

pub mod tool;
pub mod registry;
pub mod runtime;
pub mod provider;
pub mod conversation;
pub mod stream;

pub use tool::{Tool, ToolDefinition, ToolCall, ToolError, ToolResult};
pub use registry::ToolRegistry;
pub use runtime::{AgenticLoop, AgenticLoopError, LoopOutcome};
pub use provider::{LlmError, ToolAwareLlmProvider};
pub use conversation::Conversation;
pub use stream::{StopReason, StreamEvent};
