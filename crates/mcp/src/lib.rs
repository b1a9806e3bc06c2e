//! MCP (Model Context Protocol) bridge to the NetBox tool provider.
//!
//! Spawns the provider as a child process, speaks JSON-RPC 2.0 to it over
//! stdio, and exposes only an allow-listed, counted subset of its tools.
//!
//! # Architecture
//!
//! - **types**: JSON-RPC 2.0 and MCP-specific protocol types
//! - **transport**: Pluggable transport layer (stdio, channels)
//! - **client**: MCP client (handshake, discovery, calls)
//! - **launcher**: Launch configuration and process spawning
//! - **bridge**: Allow-list filtering, call counting, runtime adapters
//! - **error**: Unified error types
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use nbx_mcp::{launch, register_bridge_tools, LaunchConfig, ToolBridge};
//! use nbx_tool_runtime::ToolRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LaunchConfig::new("~/netbox-mcp-server", "https://netbox.example.com", "token");
//! let bridge: Arc<dyn ToolBridge> = Arc::new(launch(&config).await?);
//! let mut registry = ToolRegistry::new();
//! register_bridge_tools(&mut registry, bridge.clone())?;
//! // ... run a session ...
//! bridge.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod transport;
pub mod client;
pub mod launcher;
pub mod bridge;
pub mod error;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use types::*;
pub use transport::{McpTransport, StdioTransport, ChannelTransport};
pub use client::McpClient;
pub use launcher::{launch, LaunchConfig, DEFAULT_ALLOWED_TOOLS};
pub use bridge::{register_bridge_tools, BridgedTool, FilteredBridge, ToolBridge};
pub use error::McpError;
