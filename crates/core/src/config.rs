use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Model used when neither the CLI nor the environment names one.
pub const DEFAULT_MODEL: &str = "openai/gpt-5-nano";

/// Default step ceiling for one compliance session.
pub const DEFAULT_MAX_STEPS: usize = 25;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading tilde, and `~user` forms, are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Resolves `{PROFILE}_{KEY}` first, falling back to `{KEY}`.
struct Profiled<'a, F> {
    profile: &'a str,
    lookup: F,
}

impl<F> Profiled<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            let prefixed = format!("{}_{}", self.profile, key);
            if let Some(v) = (self.lookup)(&prefixed) {
                return Some(v);
            }
        }
        (self.lookup)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Everything a compliance check can pick up from the environment.
///
/// The CLI layers its own flags and config file on top of this; the library
/// crates only ever receive the resolved plain values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub netbox_url: Option<String>,
    pub netbox_token: Option<String>,
    pub mcp_server_dir: Option<PathBuf>,
    /// Generic model-provider credential (`API_KEY`).
    pub api_key: Option<String>,
    pub model: String,
    pub max_steps: usize,
    /// Only the endpoint settings the environment actually set.
    pub llm: LlmSettings,
}

impl ComplianceConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `NBX_PROFILE`. When set (e.g. `LAB`), every key is
    /// first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("NBX_PROFILE").unwrap_or_default().to_uppercase();
        Self::from_lookup(&profile, env_opt)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(profile: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let p = Profiled { profile, lookup };
        Self {
            profile: profile.to_string(),
            netbox_url: p.opt("NETBOX_URL"),
            netbox_token: p.opt("NETBOX_TOKEN"),
            mcp_server_dir: p.opt("MCP_SERVER_DIR").map(PathBuf::from),
            api_key: p.opt("API_KEY"),
            model: p.or("NBX_MODEL", DEFAULT_MODEL),
            max_steps: p.parsed("NBX_MAX_STEPS", DEFAULT_MAX_STEPS),
            llm: LlmSettings::from_profiled(&p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  netbox:  url={}", self.netbox_url.as_deref().unwrap_or("(none)"));
        tracing::info!(
            "  mcp:     dir={}",
            self.mcp_server_dir
                .as_deref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!("  model:   {} (max_steps={})", self.model, self.max_steps);
    }

    /// Environment endpoint settings over built-in defaults.
    pub fn endpoints(&self) -> LlmEndpoints {
        self.llm.clone().resolve()
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        let llm = self.endpoints();
        serde_json::json!({
            "profile": self.profile_label(),
            "netbox": {
                "url": self.netbox_url,
                "token_configured": self.netbox_token.is_some(),
            },
            "mcp_server_dir": self.mcp_server_dir,
            "model": self.model,
            "api_key_configured": self.api_key.is_some(),
            "max_steps": self.max_steps,
            "llm": {
                "openai_base_url": llm.openai_base_url,
                "anthropic_base_url": llm.anthropic_base_url,
                "ollama_url": llm.ollama_url,
            },
        })
    }
}

// ── LLM endpoints ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmEndpoints {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub ollama_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmEndpoints {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

/// Endpoint settings from one source; unset fields defer to the next source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub ollama_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmSettings {
    fn from_profiled<F>(p: &Profiled<'_, F>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            openai_base_url: p.opt("OPENAI_BASE_URL"),
            anthropic_base_url: p.opt("ANTHROPIC_BASE_URL"),
            ollama_url: p.opt("OLLAMA_URL"),
            temperature: p.opt("LLM_TEMPERATURE").and_then(|v| v.parse().ok()),
            max_tokens: p.opt("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()),
        }
    }

    /// Fill the fields this source left unset from `fallback`.
    pub fn or(self, fallback: LlmSettings) -> Self {
        Self {
            openai_base_url: self.openai_base_url.or(fallback.openai_base_url),
            anthropic_base_url: self.anthropic_base_url.or(fallback.anthropic_base_url),
            ollama_url: self.ollama_url.or(fallback.ollama_url),
            temperature: self.temperature.or(fallback.temperature),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
        }
    }

    /// Apply built-in defaults to whatever is still unset.
    pub fn resolve(self) -> LlmEndpoints {
        let defaults = LlmEndpoints::default();
        LlmEndpoints {
            openai_base_url: self.openai_base_url.unwrap_or(defaults.openai_base_url),
            anthropic_base_url: self.anthropic_base_url.unwrap_or(defaults.anthropic_base_url),
            ollama_url: self.ollama_url.unwrap_or(defaults.ollama_url),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ComplianceConfig::from_lookup("", lookup(&[]));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert!(config.netbox_url.is_none());
        assert_eq!(config.llm, LlmSettings::default());
        assert_eq!(config.endpoints().ollama_url, "http://localhost:11434");
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn test_reads_plain_keys() {
        let config = ComplianceConfig::from_lookup(
            "",
            lookup(&[
                ("NETBOX_URL", "https://netbox.example.com"),
                ("NETBOX_TOKEN", "tok"),
                ("MCP_SERVER_DIR", "/opt/netbox-mcp-server"),
                ("NBX_MAX_STEPS", "40"),
            ]),
        );
        assert_eq!(config.netbox_url.as_deref(), Some("https://netbox.example.com"));
        assert_eq!(config.netbox_token.as_deref(), Some("tok"));
        assert_eq!(
            config.mcp_server_dir,
            Some(PathBuf::from("/opt/netbox-mcp-server"))
        );
        assert_eq!(config.max_steps, 40);
    }

    #[test]
    fn test_profile_prefix_wins_over_plain_key() {
        let config = ComplianceConfig::from_lookup(
            "LAB",
            lookup(&[
                ("NETBOX_URL", "https://prod.example.com"),
                ("LAB_NETBOX_URL", "https://lab.example.com"),
                ("NETBOX_TOKEN", "shared-token"),
            ]),
        );
        assert_eq!(config.netbox_url.as_deref(), Some("https://lab.example.com"));
        assert_eq!(config.netbox_token.as_deref(), Some("shared-token"));
        assert_eq!(config.profile_label(), "LAB");
    }

    #[test]
    fn test_unparseable_number_falls_back_to_default() {
        let config = ComplianceConfig::from_lookup("", lookup(&[("NBX_MAX_STEPS", "many")]));
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_redacted_summary_hides_secrets() {
        let config = ComplianceConfig::from_lookup(
            "",
            lookup(&[("NETBOX_TOKEN", "very-secret"), ("API_KEY", "sk-secret")]),
        );
        let summary = config.redacted_summary().to_string();
        assert!(!summary.contains("very-secret"));
        assert!(!summary.contains("sk-secret"));
        assert!(summary.contains("\"token_configured\":true"));
    }

    #[test]
    fn test_endpoint_settings_layer_over_fallback() {
        let config = ComplianceConfig::from_lookup(
            "",
            lookup(&[("OPENAI_BASE_URL", "https://env-proxy"), ("LLM_MAX_TOKENS", "lots")]),
        );
        assert_eq!(config.llm.max_tokens, None);

        let file = LlmSettings {
            openai_base_url: Some("https://file-url".to_string()),
            ollama_url: Some("http://gpu-box:11434".to_string()),
            ..LlmSettings::default()
        };
        let endpoints = config.llm.clone().or(file).resolve();
        assert_eq!(endpoints.openai_base_url, "https://env-proxy");
        assert_eq!(endpoints.ollama_url, "http://gpu-box:11434");
        assert_eq!(endpoints.max_tokens, LlmEndpoints::default().max_tokens);
    }

    #[test]
    fn test_expand_home() {
        let plain = Path::new("/srv/mcp");
        assert_eq!(expand_home(plain), PathBuf::from("/srv/mcp"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/mcp")), home.join("mcp"));
        }
    }
}
