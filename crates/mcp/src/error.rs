//! Error types for the MCP crate.

use std::path::PathBuf;

/// Errors that can occur while launching or talking to a tool provider.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The provider's launch artifact is missing; nothing was spawned.
    #[error("NetBox MCP server not found at {}. Please ensure the netbox-mcp-server is installed there", .path.display())]
    ProviderNotFound { path: PathBuf },

    /// The provider process could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The operation is not on the bridge's allow-list.
    #[error("Tool '{0}' is not allowed on this bridge")]
    ToolNotAllowed(String),

    /// The server answered with a JSON-RPC error object.
    #[error("Server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Failed to parse JSON.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Transport I/O error.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The server closed its channel, exited, or the bridge was closed.
    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    /// The server answered with something that is not a valid MCP result.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl McpError {
    /// Configuration problems are detected before any process is started.
    pub fn is_configuration(&self) -> bool {
        matches!(self, McpError::ProviderNotFound { .. })
    }

    /// Whether the session can carry on after this error.
    ///
    /// Rejections and server-side tool errors leave the channel intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, McpError::ToolNotAllowed(_) | McpError::Rpc { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_found_names_path() {
        let err = McpError::ProviderNotFound {
            path: PathBuf::from("/opt/netbox-mcp-server/pyproject.toml"),
        };
        assert!(err.to_string().contains("/opt/netbox-mcp-server/pyproject.toml"));
        assert!(err.is_configuration());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_classification() {
        assert!(McpError::ToolNotAllowed("netbox_create_object".into()).is_recoverable());
        assert!(McpError::Rpc { code: -32602, message: "bad".into() }.is_recoverable());
        assert!(!McpError::ServerUnavailable("closed".into()).is_recoverable());
    }
}
