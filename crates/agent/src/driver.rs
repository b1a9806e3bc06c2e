//! One compliance check from rule and scope to classified result.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use nbx_core::{config::DEFAULT_MAX_STEPS, LlmEndpoints, Scope};
use nbx_llm::{create_tool_provider, ModelRoute, ProviderKind};
use nbx_mcp::LaunchConfig;

use crate::classify::{classify, ComplianceResult};
use crate::error::CheckError;
use crate::prompts::instructions_with_examples;
use crate::session::{AgentSessionRunner, BridgeLauncher, SessionRunner, StdioLauncher};
use crate::task::build_task_message;

/// Acquires a bridge, runs one session, always releases the bridge, and
/// classifies the answer.
pub struct ComplianceDriver {
    launcher: Arc<dyn BridgeLauncher>,
    runner: Arc<dyn SessionRunner>,
}

impl ComplianceDriver {
    pub fn new(launcher: Arc<dyn BridgeLauncher>, runner: Arc<dyn SessionRunner>) -> Self {
        Self { launcher, runner }
    }

    pub async fn check(
        &self,
        rule: &str,
        scope: &Scope,
        limit: Option<usize>,
        max_steps: usize,
    ) -> Result<ComplianceResult, CheckError> {
        let task = build_task_message(rule, scope, limit);

        let bridge = self.launcher.launch().await?;
        let outcome = self.runner.run_session(&task, bridge.clone(), max_steps).await;

        // Dropping the bridge would also kill the child; closing first lets it
        // exit on end-of-input.
        if let Err(e) = bridge.close().await {
            warn!(error = %e, "Failed to close tool bridge");
        }

        let answer = outcome?;
        if !answer.concluded {
            warn!(max_steps, "Step ceiling reached before a final answer");
        }

        let result = classify(answer.text, bridge.call_count());
        info!(
            status = %result.status,
            tool_calls = result.tool_calls,
            turns = answer.turns,
            "Compliance check finished"
        );
        Ok(result)
    }
}

/// Everything needed for a standalone check.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub rule: String,
    pub scope: Scope,
    /// `provider/model`, e.g. `openai/gpt-5-nano`.
    pub model: String,
    pub api_key: Option<String>,
    pub mcp_dir: PathBuf,
    pub netbox_url: String,
    pub netbox_token: String,
    pub limit: Option<usize>,
    pub max_steps: usize,
    pub endpoints: LlmEndpoints,
    /// Append the worked example scenarios to the system instructions.
    pub include_examples: bool,
}

impl CheckOptions {
    pub fn new(
        rule: impl Into<String>,
        scope: Scope,
        mcp_dir: impl Into<PathBuf>,
        netbox_url: impl Into<String>,
        netbox_token: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            scope,
            model: nbx_core::config::DEFAULT_MODEL.to_string(),
            api_key: None,
            mcp_dir: mcp_dir.into(),
            netbox_url: netbox_url.into(),
            netbox_token: netbox_token.into(),
            limit: None,
            max_steps: DEFAULT_MAX_STEPS,
            endpoints: LlmEndpoints::default(),
            include_examples: false,
        }
    }
}

/// Pick the model credential: explicit value, then `API_KEY`, then the
/// provider's own variable. Blank values are skipped.
pub fn resolve_api_key<F>(explicit: Option<&str>, provider: ProviderKind, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |key: &String| !key.trim().is_empty();
    explicit
        .map(str::to_string)
        .filter(non_blank)
        .or_else(|| lookup("API_KEY").filter(non_blank))
        .or_else(|| provider.api_key_var().and_then(&lookup).filter(non_blank))
}

/// Run one check with the stdio bridge and the routed model provider.
///
/// Model routing and the credential are resolved before anything is spawned.
pub async fn run_once(options: CheckOptions) -> Result<ComplianceResult, CheckError> {
    run_once_with_lookup(options, |key| std::env::var(key).ok()).await
}

/// [`run_once`] with the credential variables read through `lookup`.
pub async fn run_once_with_lookup<F>(
    options: CheckOptions,
    lookup: F,
) -> Result<ComplianceResult, CheckError>
where
    F: Fn(&str) -> Option<String>,
{
    let route = ModelRoute::parse(&options.model)?;
    let api_key = resolve_api_key(options.api_key.as_deref(), route.provider, lookup).ok_or(
        CheckError::MissingCredential {
            provider: route.provider,
        },
    )?;

    let provider = create_tool_provider(&route, &api_key, &options.endpoints);
    let mut runner = AgentSessionRunner::new(provider).with_endpoints(&options.endpoints);
    if options.include_examples {
        runner = runner.with_instructions(instructions_with_examples());
    }
    let launcher = StdioLauncher::new(LaunchConfig::new(
        options.mcp_dir,
        options.netbox_url,
        options.netbox_token,
    ));

    info!(model = %route, "Running compliance check");
    ComplianceDriver::new(Arc::new(launcher), Arc::new(runner))
        .check(&options.rule, &options.scope, options.limit, options.max_steps)
        .await
}
