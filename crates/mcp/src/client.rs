//! MCP client implementation.
//!
//! Speaks JSON-RPC to an MCP server over any [`McpTransport`]: performs the
//! initialize handshake, lists tools, and forwards tool calls. Requests are
//! strictly one at a time; the transport lock is held for the full round trip.

use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::*;

/// An MCP client bound to one connected transport.
pub struct McpClient<T> {
    transport: Mutex<T>,
    next_id: AtomicI64,
    server_info: Option<ServerInfo>,
}

impl<T: McpTransport> McpClient<T> {
    /// Connect over an already open transport and run the handshake.
    pub async fn connect(transport: T) -> Result<Self, McpError> {
        let mut client = Self {
            transport: Mutex::new(transport),
            next_id: AtomicI64::new(1),
            server_info: None,
        };
        client.initialize().await?;
        Ok(client)
    }

    /// Server name and version reported during the handshake.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Send a JSON-RPC request and wait for the response with the same id.
    ///
    /// Lines that are not responses (server log output, server-initiated
    /// notifications or requests) and responses for other ids are skipped.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(RpcId::Number(id), method, params);
        let json = serde_json::to_string(&request)?;

        tracing::debug!(method = %method, id = %id, "Sending request");

        let mut transport = self.transport.lock().await;
        transport.send(&json).await?;

        loop {
            let Some(line) = transport.receive().await? else {
                return Err(McpError::ServerUnavailable(format!(
                    "server closed its output while waiting for '{}'",
                    method
                )));
            };

            let raw: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(_) => {
                    tracing::trace!(line = %line, "Skipping non-JSON line from server");
                    continue;
                }
            };
            if raw.get("method").is_some() {
                tracing::debug!("Skipping server-initiated message");
                continue;
            }

            let response: JsonRpcResponse = match serde_json::from_value(raw) {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed JSON-RPC message");
                    continue;
                }
            };
            if response.id != RpcId::Number(id) {
                tracing::debug!(expected = id, got = ?response.id, "Skipping response for another request");
                continue;
            }

            if let Some(err) = response.error {
                return Err(McpError::Rpc {
                    code: err.code,
                    message: err.message,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notif = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&notif)?;
        self.transport.lock().await.send(&json).await
    }

    /// Perform MCP initialization handshake.
    async fn initialize(&mut self) -> Result<(), McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": ClientInfo {
                name: "nbx-compliance".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        });

        let result = self.request("initialize", Some(params)).await.map_err(|e| match e {
            McpError::Rpc { message, .. } => McpError::ServerUnavailable(message),
            other => other,
        })?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::InvalidResponse(format!("initialize: {}", e)))?;

        self.notify("notifications/initialized", None).await?;

        tracing::info!(
            server = %init.server_info.name,
            protocol = %init.protocol_version,
            "MCP client initialized"
        );
        self.server_info = Some(init.server_info);
        Ok(())
    }

    /// List every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| McpError::InvalidResponse(format!("tools/list: {}", e)))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        tracing::debug!(count = tools.len(), "Tool discovery complete");
        Ok(tools)
    }

    /// Call a tool on the remote MCP server.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::InvalidResponse(format!("tools/call: {}", e)))
    }

    /// Close the outbound channel.
    pub async fn close(&self) -> Result<(), McpError> {
        self.transport.lock().await.close().await
    }
}
