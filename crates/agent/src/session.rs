//! Collaborators the driver depends on: where bridges come from and who runs
//! the bounded session.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use nbx_core::LlmEndpoints;
use nbx_mcp::{launch, register_bridge_tools, LaunchConfig, McpError, ToolBridge};
use nbx_tool_runtime::{AgenticLoop, Conversation, StopReason, ToolAwareLlmProvider, ToolRegistry};

use crate::error::CheckError;
use crate::prompts::SYSTEM_INSTRUCTIONS;

/// Approximate context budget for one session's history.
const DEFAULT_CONTEXT_TOKENS: usize = 100_000;

/// What a bounded session ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAnswer {
    /// Final answer, or the last partial text when the ceiling was hit.
    pub text: String,
    /// `false` when the step ceiling stopped the session.
    pub concluded: bool,
    pub turns: usize,
}

/// Runs one bounded session against a bridge.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn run_session(
        &self,
        task: &str,
        bridge: Arc<dyn ToolBridge>,
        max_steps: usize,
    ) -> Result<SessionAnswer, CheckError>;
}

/// Produces a fresh bridge for each check.
#[async_trait]
pub trait BridgeLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn ToolBridge>, McpError>;
}

/// Spawns the NetBox MCP server over stdio.
pub struct StdioLauncher {
    config: LaunchConfig,
}

impl StdioLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BridgeLauncher for StdioLauncher {
    async fn launch(&self) -> Result<Arc<dyn ToolBridge>, McpError> {
        let bridge = launch(&self.config).await?;
        Ok(Arc::new(bridge))
    }
}

/// Session runner backed by the agentic loop and a tool-aware model.
pub struct AgentSessionRunner {
    provider: Arc<dyn ToolAwareLlmProvider>,
    instructions: String,
    temperature: f32,
    max_tokens: u32,
}

impl AgentSessionRunner {
    pub fn new(provider: Arc<dyn ToolAwareLlmProvider>) -> Self {
        let defaults = LlmEndpoints::default();
        Self {
            provider,
            instructions: SYSTEM_INSTRUCTIONS.to_string(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Take sampling settings from the configured endpoints.
    pub fn with_endpoints(mut self, endpoints: &LlmEndpoints) -> Self {
        self.temperature = endpoints.temperature;
        self.max_tokens = endpoints.max_tokens;
        self
    }
}

#[async_trait]
impl SessionRunner for AgentSessionRunner {
    async fn run_session(
        &self,
        task: &str,
        bridge: Arc<dyn ToolBridge>,
        max_steps: usize,
    ) -> Result<SessionAnswer, CheckError> {
        let mut registry = ToolRegistry::new();
        let count = register_bridge_tools(&mut registry, bridge)?;
        debug!(tools = ?registry.names(), "Registered bridged tools");

        let agentic_loop = AgenticLoop::new(self.provider.clone(), Arc::new(registry))
            .with_max_iterations(max_steps)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let mut conversation =
            Conversation::new(DEFAULT_CONTEXT_TOKENS).with_system_prompt(self.instructions.clone());

        info!(
            provider = self.provider.provider_name(),
            tools = count,
            max_steps,
            "Starting compliance session"
        );
        let outcome = agentic_loop.run(&mut conversation, task.to_string()).await?;
        if outcome.stop_reason == StopReason::MaxTokens {
            warn!(
                max_tokens = self.max_tokens,
                "Model ran out of output tokens; raise LLM_MAX_TOKENS if the report is missing"
            );
        }

        Ok(SessionAnswer {
            text: outcome.final_text,
            concluded: !outcome.hit_limit,
            turns: outcome.iterations,
        })
    }
}
