//! Allow-listed, counted access to an MCP server's tools.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nbx_tool_runtime::registry::RegistryError;
use nbx_tool_runtime::{Tool, ToolDefinition, ToolError, ToolRegistry, ToolResult};
use serde_json::Value;
use tokio::process::Child;
use tokio::sync::Mutex;

use crate::client::McpClient;
use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::CallToolResult;

const EXIT_GRACE: Duration = Duration::from_secs(2);

/// What a session sees of the tool provider.
#[async_trait]
pub trait ToolBridge: Send + Sync {
    /// Tools the session may call.
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError>;

    /// Completed round trips so far.
    fn call_count(&self) -> usize;

    /// Release the provider. Safe to call more than once.
    async fn close(&self) -> Result<(), McpError>;
}

/// A connected MCP client restricted to an allow-list, with a call counter.
pub struct FilteredBridge<T> {
    client: McpClient<T>,
    allowed: BTreeSet<String>,
    tools: Vec<ToolDefinition>,
    calls: AtomicUsize,
    closed: AtomicBool,
    process: Mutex<Option<Child>>,
}

impl<T: McpTransport> FilteredBridge<T> {
    /// Handshake, discover tools, and keep only those on the allow-list.
    pub async fn connect<I, S>(transport: T, allowed: I) -> Result<Self, McpError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: BTreeSet<String> = allowed.into_iter().map(Into::into).collect();
        let client = McpClient::connect(transport).await?;

        let discovered = client.list_tools().await?;
        let total = discovered.len();
        let tools: Vec<ToolDefinition> = discovered
            .into_iter()
            .filter(|t| allowed.contains(&t.name))
            .map(ToolDefinition::from)
            .collect();

        for name in &allowed {
            if !tools.iter().any(|t| &t.name == name) {
                tracing::debug!(tool = %name, "Allowed tool not offered by server");
            }
        }
        tracing::info!(discovered = total, exposed = tools.len(), "Tool bridge ready");

        Ok(Self {
            client,
            allowed,
            tools,
            calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            process: Mutex::new(None),
        })
    }

    /// Attach the child process so `close` can reap it.
    pub fn with_process(self, child: Child) -> Self {
        Self {
            process: Mutex::new(Some(child)),
            ..self
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }
}

#[async_trait]
impl<T: McpTransport + 'static> ToolBridge for FilteredBridge<T> {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        if !self.is_allowed(name) {
            tracing::warn!(tool = %name, "Rejected call outside the allow-list");
            return Err(McpError::ToolNotAllowed(name.to_string()));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(McpError::ServerUnavailable("bridge is closed".to_string()));
        }

        let result = self.client.call_tool(name, arguments).await?;
        let count = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(tool = %name, count, is_error = result.is_error, "Tool call complete");
        Ok(result)
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let closed = self.client.close().await;

        if let Some(mut child) = self.process.lock().await.take() {
            match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(%status, "MCP server exited"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Failed waiting for MCP server"),
                Err(_) => {
                    tracing::warn!("MCP server did not exit after stdin closed, killing");
                    child.kill().await?;
                }
            }
        }
        closed
    }
}

/// One bridged tool exposed to the session loop.
pub struct BridgedTool {
    definition: ToolDefinition,
    bridge: Arc<dyn ToolBridge>,
}

impl BridgedTool {
    pub fn new(definition: ToolDefinition, bridge: Arc<dyn ToolBridge>) -> Self {
        Self { definition, bridge }
    }
}

#[async_trait]
impl Tool for BridgedTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, input: Value) -> Result<ToolResult, ToolError> {
        match self.bridge.call_tool(&self.definition.name, input).await {
            Ok(result) => Ok(ToolResult {
                tool_call_id: String::new(),
                content: result.joined_text(),
                is_error: result.is_error,
            }),
            Err(e) if e.is_recoverable() => Err(ToolError::Rejected(e.to_string())),
            Err(e) => Err(ToolError::Transport(e.to_string())),
        }
    }
}

/// Register every tool the bridge exposes. Returns how many were added.
pub fn register_bridge_tools(
    registry: &mut ToolRegistry,
    bridge: Arc<dyn ToolBridge>,
) -> Result<usize, RegistryError> {
    let definitions = bridge.tool_definitions();
    let count = definitions.len();
    for definition in definitions {
        registry.register(BridgedTool::new(definition, bridge.clone()))?;
    }
    Ok(count)
}
