use std::path::PathBuf;

use nbx_core::ScopeError;
use nbx_llm::{ProviderKind, RouteError};
use nbx_mcp::McpError;
use nbx_tool_runtime::registry::RegistryError;
use nbx_tool_runtime::{AgenticLoopError, LlmError, ToolError};

/// Why a compliance check did not produce a result.
///
/// Configuration errors are raised before any process is spawned or any
/// request is sent; session errors happen once a check is under way.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(
        "API key is required for {provider}. Set API_KEY{} or use --api-key",
        .provider.api_key_var().map(|v| format!(" or {v}")).unwrap_or_default()
    )]
    MissingCredential { provider: ProviderKind },

    #[error("NetBox MCP server not found at {}", .path.display())]
    ProviderNotFound { path: PathBuf },

    #[error(transparent)]
    UnknownProvider(#[from] RouteError),

    #[error("Invalid scope: {0}")]
    Scope(#[from] ScopeError),

    #[error("Tool bridge failed: {0}")]
    Bridge(#[source] McpError),

    #[error("Model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("Could not register NetBox tools: {0}")]
    Registry(#[from] RegistryError),

    #[error("Tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },
}

impl CheckError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CheckError::MissingCredential { .. }
                | CheckError::ProviderNotFound { .. }
                | CheckError::UnknownProvider(_)
                | CheckError::Scope(_)
        )
    }
}

impl From<McpError> for CheckError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::ProviderNotFound { path } => CheckError::ProviderNotFound { path },
            other => CheckError::Bridge(other),
        }
    }
}

impl From<AgenticLoopError> for CheckError {
    fn from(err: AgenticLoopError) -> Self {
        match err {
            AgenticLoopError::LlmError(e) => CheckError::Model(e),
            AgenticLoopError::Tool { name, source } => CheckError::Tool { name, source },
        }
    }
}
