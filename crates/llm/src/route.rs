//! Model identifiers of the form `provider/model`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which API family serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    /// Provider-specific variable consulted when no generic key is given.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(RouteError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("unknown model provider '{0}' (expected openai, anthropic or ollama)")]
    UnknownProvider(String),
    #[error("model identifier '{0}' names no model")]
    EmptyModel(String),
}

/// A parsed model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelRoute {
    /// Parse `provider/model`. A bare name is treated as an OpenAI model.
    ///
    /// Only the first `/` separates the provider, so `ollama/library/llama3`
    /// keeps `library/llama3` as the model.
    pub fn parse(identifier: &str) -> Result<Self, RouteError> {
        let identifier = identifier.trim();
        let (provider, model) = match identifier.split_once('/') {
            Some((prefix, model)) => (prefix.parse()?, model),
            None => (ProviderKind::OpenAi, identifier),
        };
        if model.is_empty() {
            return Err(RouteError::EmptyModel(identifier.to_string()));
        }
        Ok(Self {
            provider,
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed() {
        let route = ModelRoute::parse("openai/gpt-5-nano").unwrap();
        assert_eq!(route.provider, ProviderKind::OpenAi);
        assert_eq!(route.model, "gpt-5-nano");

        let route = ModelRoute::parse("anthropic/claude-sonnet-4-20250514").unwrap();
        assert_eq!(route.provider, ProviderKind::Anthropic);
        assert_eq!(route.to_string(), "anthropic/claude-sonnet-4-20250514");
    }

    #[test]
    fn test_bare_name_defaults_to_openai() {
        let route = ModelRoute::parse("gpt-4o").unwrap();
        assert_eq!(route.provider, ProviderKind::OpenAi);
        assert_eq!(route.model, "gpt-4o");
    }

    #[test]
    fn test_only_first_slash_splits() {
        let route = ModelRoute::parse("ollama/library/llama3.1").unwrap();
        assert_eq!(route.provider, ProviderKind::Ollama);
        assert_eq!(route.model, "library/llama3.1");
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        assert_eq!(
            ModelRoute::parse("mistral/large"),
            Err(RouteError::UnknownProvider("mistral".to_string()))
        );
        assert!(matches!(ModelRoute::parse("openai/"), Err(RouteError::EmptyModel(_))));
        assert!(matches!(ModelRoute::parse(""), Err(RouteError::EmptyModel(_))));
    }

    #[test]
    fn test_api_key_vars() {
        assert_eq!(ProviderKind::OpenAi.api_key_var(), Some("OPENAI_API_KEY"));
        assert_eq!(ProviderKind::Anthropic.api_key_var(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(ProviderKind::Ollama.api_key_var(), None);
    }
}
