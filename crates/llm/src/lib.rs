//! Tool-aware model providers and `provider/model` routing.

pub mod providers;
pub mod route;

pub use providers::{create_tool_provider, AnthropicToolProvider, OpenAiToolProvider};
pub use route::{ModelRoute, ProviderKind, RouteError};
