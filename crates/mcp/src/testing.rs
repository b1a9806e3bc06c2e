//! Scripted in-process MCP peer for tests.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::bridge::FilteredBridge;
use crate::error::McpError;
use crate::transport::{ChannelTransport, McpTransport};
use crate::types::*;

type Handler = Arc<dyn Fn(&str, &Value) -> CallToolResult + Send + Sync>;

/// Calls the fake server received, in order.
pub type CallLog = Arc<Mutex<Vec<(String, Value)>>>;

/// A fake NetBox MCP server answering over a [`ChannelTransport`].
pub struct FakeNetbox {
    tools: Vec<String>,
    handler: Handler,
    calls: CallLog,
    exit_after: Option<usize>,
}

impl FakeNetbox {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            handler: Arc::new(|_, _| CallToolResult::text("[]")),
            calls: Arc::new(Mutex::new(Vec::new())),
            exit_after: None,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Answer every `tools/call` with `handler(name, arguments)`.
    pub fn respond<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Value) -> CallToolResult + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Hang up after answering `n` tool calls, as a crashed server would.
    pub fn exit_after_calls(mut self, n: usize) -> Self {
        self.exit_after = Some(n);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    /// Start serving and return the client half.
    pub fn serve(self) -> ChannelTransport {
        let (client, mut server) = ChannelTransport::pair();
        tokio::spawn(async move {
            let mut answered = 0;
            while let Ok(Some(line)) = server.receive().await {
                let Ok(request) = serde_json::from_str::<JsonRpcRequest>(&line) else {
                    continue; // notifications
                };
                let response = self.answer(&request);
                let Ok(encoded) = serde_json::to_string(&response) else {
                    break;
                };
                if server.send(&encoded).await.is_err() {
                    break;
                }
                if request.method == "tools/call" {
                    answered += 1;
                    if self.exit_after.is_some_and(|n| answered >= n) {
                        break;
                    }
                }
            }
        });
        client
    }

    /// Serve and connect a bridge restricted to `allowed`.
    pub async fn bridge<I, S>(self, allowed: I) -> Result<FilteredBridge<ChannelTransport>, McpError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilteredBridge::connect(self.serve(), allowed).await
    }

    fn answer(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake-netbox", "version": "0.0.0"}
                }),
            ),
            "tools/list" => {
                let tools: Vec<Value> = self
                    .tools
                    .iter()
                    .map(|name| {
                        json!({
                            "name": name,
                            "description": format!("Fake {}", name),
                            "inputSchema": {"type": "object", "properties": {}}
                        })
                    })
                    .collect();
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            "tools/call" => {
                let params: CallToolParams = match request
                    .params
                    .clone()
                    .map(serde_json::from_value)
                    .transpose()
                {
                    Ok(Some(p)) => p,
                    _ => {
                        return JsonRpcResponse::error(
                            id,
                            error_codes::INVALID_PARAMS,
                            "missing tool call params",
                        )
                    }
                };
                if let Ok(mut calls) = self.calls.lock() {
                    calls.push((params.name.clone(), params.arguments.clone()));
                }
                let result = (self.handler)(&params.name, &params.arguments);
                match serde_json::to_value(result) {
                    Ok(v) => JsonRpcResponse::success(id, v),
                    Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
                }
            }
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }
}

impl Default for FakeNetbox {
    fn default() -> Self {
        Self::new()
    }
}
