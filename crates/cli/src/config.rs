use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use nbx_agent::CheckOptions;
use nbx_core::config::{expand_home, DEFAULT_MAX_STEPS, DEFAULT_MODEL};
use nbx_core::{ComplianceConfig, LlmSettings, Scope, ScopeError};

use crate::cli::CheckArgs;

/// Defaults loaded from the optional TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Default model (`provider/model`)
    pub model: Option<String>,

    /// NetBox MCP server checkout
    pub mcp_dir: Option<String>,

    pub netbox_url: Option<String>,

    pub max_steps: Option<usize>,

    /// Model endpoint settings (`openai_base_url`, `ollama_url`, `max_tokens`, ...)
    #[serde(flatten)]
    pub llm: LlmSettings,

    /// Append the worked example scenarios to the system instructions
    pub include_examples: Option<bool>,
}

impl CliConfig {
    /// Return the default config file path: ~/.config/netbox-agent-compliance/config.toml
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("netbox-agent-compliance");
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::read(&expand_home(Path::new(p))),
            None => {
                let default_path = Self::default_config_path()?;
                if default_path.exists() {
                    Self::read(&default_path)
                } else {
                    debug!(?default_path, "Config file not found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        debug!(?path, "Loading config");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }
}

/// Input problems reported before a check starts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one scope (--site, --rack, or --device) must be specified")]
    NoScope,
    #[error("{0}")]
    Scope(ScopeError),
    #[error("NETBOX_URL environment variable or --netbox-url option is required")]
    MissingNetboxUrl,
    #[error("NETBOX_TOKEN environment variable or --netbox-token option is required")]
    MissingNetboxToken,
    #[error("MCP_SERVER_DIR environment variable or --mcp-dir option is required")]
    MissingMcpDir,
}

/// Merge flags (and their env vars), the profiled environment, and the file.
///
/// Precedence per value: flag/env var, then profiled environment, then file,
/// then built-in default.
pub fn resolve_check(
    args: &CheckArgs,
    env: &ComplianceConfig,
    file: &CliConfig,
) -> Result<CheckOptions, ValidationError> {
    let [site, rack, device] = args.filters();
    let scope = Scope::from_filters(site, rack, device).map_err(|e| match e {
        ScopeError::Empty => ValidationError::NoScope,
        other => ValidationError::Scope(other),
    })?;

    let netbox_url = first_non_empty([
        args.netbox_url.clone(),
        env.netbox_url.clone(),
        file.netbox_url.clone(),
    ])
    .ok_or(ValidationError::MissingNetboxUrl)?;
    let netbox_token = first_non_empty([args.netbox_token.clone(), env.netbox_token.clone()])
        .ok_or(ValidationError::MissingNetboxToken)?;
    let mcp_dir = first_non_empty([
        args.mcp_dir.clone(),
        env.mcp_server_dir.as_ref().map(|p| p.display().to_string()),
        file.mcp_dir.clone(),
    ])
    .ok_or(ValidationError::MissingMcpDir)?;

    // `env.model`/`env.max_steps` already carry built-in defaults, so the file
    // only wins when the environment left them unset.
    let model = first_non_empty([args.model.clone()])
        .or_else(|| (env.model != DEFAULT_MODEL).then(|| env.model.clone()))
        .or_else(|| file.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let max_steps = args
        .max_steps
        .or_else(|| (env.max_steps != DEFAULT_MAX_STEPS).then_some(env.max_steps))
        .or(file.max_steps)
        .unwrap_or(DEFAULT_MAX_STEPS);

    let endpoints = env.llm.clone().or(file.llm.clone()).resolve();

    let mut options = CheckOptions::new(&args.rule, scope, mcp_dir, netbox_url, netbox_token);
    options.model = model;
    options.api_key = first_non_empty([args.api_key.clone(), env.api_key.clone()]);
    options.limit = args.limit;
    options.max_steps = max_steps;
    options.endpoints = endpoints;
    options.include_examples = args.include_examples || file.include_examples.unwrap_or(false);
    Ok(options)
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{CliArgs, Command};
    use clap::Parser;

    fn check_args(extra: &[&str]) -> CheckArgs {
        let mut argv = vec!["netbox-agent-compliance", "check", "every device must have a primary IP"];
        argv.extend_from_slice(extra);
        let Command::Check(args) = CliArgs::try_parse_from(argv).unwrap().command;
        args
    }

    fn empty_env() -> ComplianceConfig {
        ComplianceConfig::from_lookup("", |_| None)
    }

    const NETBOX: [&str; 6] = [
        "--netbox-url",
        "https://netbox.example.com",
        "--netbox-token",
        "tok",
        "--mcp-dir",
        "~/netbox-mcp-server",
    ];

    #[test]
    fn test_requires_scope() {
        let args = check_args(&NETBOX);
        let err = resolve_check(&args, &empty_env(), &CliConfig::default()).unwrap_err();
        assert_eq!(err, ValidationError::NoScope);
        assert_eq!(
            err.to_string(),
            "At least one scope (--site, --rack, or --device) must be specified"
        );

        // Blank filters are the same as none.
        let mut argv = vec!["--site", "", "--device", "  "];
        argv.extend_from_slice(&NETBOX);
        let err = resolve_check(&check_args(&argv), &empty_env(), &CliConfig::default()).unwrap_err();
        assert_eq!(err, ValidationError::NoScope);
    }

    #[test]
    fn test_requires_netbox_settings() {
        let args = check_args(&["--site", "DM-Akron", "--mcp-dir", "/opt/mcp"]);
        let err = resolve_check(&args, &empty_env(), &CliConfig::default()).unwrap_err();
        assert_eq!(err, ValidationError::MissingNetboxUrl);

        let args = check_args(&["--site", "DM-Akron", "--netbox-url", "https://nb", "--mcp-dir", "/opt/mcp"]);
        let err = resolve_check(&args, &empty_env(), &CliConfig::default()).unwrap_err();
        assert_eq!(err, ValidationError::MissingNetboxToken);
    }

    #[test]
    fn test_defaults_applied() {
        let mut argv = vec!["--site", "DM-Akron"];
        argv.extend_from_slice(&NETBOX);
        let options = resolve_check(&check_args(&argv), &empty_env(), &CliConfig::default()).unwrap();
        assert_eq!(options.model, DEFAULT_MODEL);
        assert_eq!(options.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(options.scope.render(), "site=DM-Akron");
        assert_eq!(options.mcp_dir, PathBuf::from("~/netbox-mcp-server"));
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_file_fills_gaps_but_flags_win() {
        let file: CliConfig = toml::from_str(
            r#"
            model = "anthropic/claude-sonnet-4-20250514"
            max_steps = 40
            ollama_url = "http://gpu-box:11434"
            "#,
        )
        .unwrap();

        let mut argv = vec!["--rack", "R01"];
        argv.extend_from_slice(&NETBOX);
        let options = resolve_check(&check_args(&argv), &empty_env(), &file).unwrap();
        assert_eq!(options.model, "anthropic/claude-sonnet-4-20250514");
        assert_eq!(options.max_steps, 40);
        assert_eq!(options.endpoints.ollama_url, "http://gpu-box:11434");

        argv.extend_from_slice(&["--model", "openai/gpt-4o", "--max-steps", "10"]);
        let options = resolve_check(&check_args(&argv), &empty_env(), &file).unwrap();
        assert_eq!(options.model, "openai/gpt-4o");
        assert_eq!(options.max_steps, 10);
    }

    #[test]
    fn test_environment_endpoints_win_over_file() {
        let file: CliConfig = toml::from_str(
            r#"
            openai_base_url = "https://file-url"
            max_tokens = 8192
            include_examples = true
            "#,
        )
        .unwrap();
        let env = ComplianceConfig::from_lookup("", |key| {
            (key == "OPENAI_BASE_URL").then(|| "https://env-proxy".to_string())
        });

        let mut argv = vec!["--site", "DM-Akron"];
        argv.extend_from_slice(&NETBOX);
        let options = resolve_check(&check_args(&argv), &env, &file).unwrap();
        assert_eq!(options.endpoints.openai_base_url, "https://env-proxy");
        assert_eq!(options.endpoints.max_tokens, 8192);
        assert!(options.include_examples);
    }

    #[test]
    fn test_profiled_environment_fills_netbox_settings() {
        let env = ComplianceConfig::from_lookup("LAB", |key| match key {
            "LAB_NETBOX_URL" => Some("https://lab.example.com".to_string()),
            "NETBOX_TOKEN" => Some("lab-token".to_string()),
            "MCP_SERVER_DIR" => Some("/srv/mcp".to_string()),
            _ => None,
        });
        let options = resolve_check(&check_args(&["--device", "sw01"]), &env, &CliConfig::default()).unwrap();
        assert_eq!(options.netbox_url, "https://lab.example.com");
        assert_eq!(options.netbox_token, "lab-token");
        assert_eq!(options.mcp_dir, PathBuf::from("/srv/mcp"));
    }

    #[test]
    fn test_explicit_missing_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(CliConfig::load(Some(missing.to_str().unwrap())).is_err());

        let present = dir.path().join("config.toml");
        std::fs::write(&present, "max_steps = 12\n").unwrap();
        let config = CliConfig::load(Some(present.to_str().unwrap())).unwrap();
        assert_eq!(config.max_steps, Some(12));
    }
}
