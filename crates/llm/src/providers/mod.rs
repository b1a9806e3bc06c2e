pub mod anthropic;
pub mod openai;

use std::sync::Arc;

use futures::stream;
use nbx_core::config::LlmEndpoints;
use nbx_tool_runtime::provider::{EventStream, LlmError, ToolAwareLlmProvider};
use nbx_tool_runtime::stream::StreamEvent;

use crate::route::{ModelRoute, ProviderKind};

pub use anthropic::AnthropicToolProvider;
pub use openai::OpenAiToolProvider;

const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Create the tool-aware provider a model route points at.
pub fn create_tool_provider(
    route: &ModelRoute,
    api_key: &str,
    endpoints: &LlmEndpoints,
) -> Arc<dyn ToolAwareLlmProvider> {
    match route.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiToolProvider::new(
            api_key.to_string(),
            route.model.clone(),
            endpoints.openai_base_url.clone(),
        )),
        ProviderKind::Anthropic => Arc::new(AnthropicToolProvider::new(
            api_key.to_string(),
            route.model.clone(),
            endpoints.anthropic_base_url.clone(),
        )),
        ProviderKind::Ollama => Arc::new(OpenAiToolProvider::ollama(
            api_key.to_string(),
            route.model.clone(),
            endpoints.ollama_url.clone(),
        )),
    }
}

/// Replay a complete turn as a stream.
pub(crate) fn replay(events: Vec<StreamEvent>) -> EventStream {
    Box::pin(stream::iter(events.into_iter().map(Ok)))
}

/// Map a non-2xx response to an error, consuming its body.
pub(crate) async fn error_for_status(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    status_error(status, retry_after, body)
}

fn status_error(status: u16, retry_after: Option<u64>, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthError,
        429 => LlmError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        _ => LlmError::ApiError {
            status,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, None, String::new()), LlmError::AuthError));
        assert!(matches!(status_error(403, None, String::new()), LlmError::AuthError));
        assert!(matches!(
            status_error(429, Some(5), String::new()),
            LlmError::RateLimited { retry_after_secs: 5 }
        ));
        assert!(matches!(
            status_error(429, None, String::new()),
            LlmError::RateLimited { retry_after_secs: DEFAULT_RETRY_AFTER_SECS }
        ));
        match status_error(500, None, "overloaded".to_string()) {
            LlmError::ApiError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn test_factory_picks_provider() {
        let endpoints = LlmEndpoints::default();
        let openai = create_tool_provider(&ModelRoute::parse("openai/gpt-5-nano").unwrap(), "k", &endpoints);
        assert_eq!(openai.provider_name(), "openai");

        let claude = create_tool_provider(
            &ModelRoute::parse("anthropic/claude-sonnet-4-20250514").unwrap(),
            "k",
            &endpoints,
        );
        assert_eq!(claude.provider_name(), "anthropic");

        let local = create_tool_provider(&ModelRoute::parse("ollama/llama3.1").unwrap(), "k", &endpoints);
        assert_eq!(local.provider_name(), "ollama");
    }
}
