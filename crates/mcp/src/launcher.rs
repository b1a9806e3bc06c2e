//! Spawning the NetBox MCP server as a child process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::bridge::FilteredBridge;
use crate::error::McpError;
use crate::transport::StdioTransport;

/// Read-only NetBox operations a session may use unless told otherwise.
pub const DEFAULT_ALLOWED_TOOLS: [&str; 4] = [
    "netbox_get_objects",
    "netbox_get_object_by_id",
    "netbox_get_changelogs",
    "netbox_search_objects",
];

pub const NETBOX_URL_VAR: &str = "NETBOX_URL";
pub const NETBOX_TOKEN_VAR: &str = "NETBOX_TOKEN";

const DIR_PLACEHOLDER: &str = "{dir}";

/// How to start the tool provider and what it may be asked to do.
#[derive(Clone)]
pub struct LaunchConfig {
    pub provider_dir: PathBuf,
    pub netbox_url: String,
    pub netbox_token: String,
    pub allowed_tools: Vec<String>,
    pub program: String,
    /// Arguments; `{dir}` is replaced with the expanded provider directory.
    pub args: Vec<String>,
    /// File that must exist in the provider directory before spawning.
    pub artifact: String,
}

impl LaunchConfig {
    pub fn new(
        provider_dir: impl Into<PathBuf>,
        netbox_url: impl Into<String>,
        netbox_token: impl Into<String>,
    ) -> Self {
        Self {
            provider_dir: provider_dir.into(),
            netbox_url: netbox_url.into(),
            netbox_token: netbox_token.into(),
            allowed_tools: DEFAULT_ALLOWED_TOOLS.iter().map(|s| s.to_string()).collect(),
            program: "uv".to_string(),
            args: ["--directory", DIR_PLACEHOLDER, "run", "netbox-mcp-server"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            artifact: "pyproject.toml".to_string(),
        }
    }

    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the command template, e.g. `python server.py` with artifact `server.py`.
    pub fn with_command<I, S>(mut self, program: impl Into<String>, args: I, artifact: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.args = args.into_iter().map(Into::into).collect();
        self.artifact = artifact.into();
        self
    }

    /// Provider directory with `~` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        nbx_core::config::expand_home(&self.provider_dir)
    }

    /// Where the launch artifact is expected.
    pub fn artifact_path(&self) -> PathBuf {
        self.resolved_dir().join(&self.artifact)
    }

    /// Build the child command. The inherited environment is kept; the two
    /// NetBox values are set explicitly and never appear in the arguments.
    pub fn command(&self) -> Command {
        let dir = self.resolved_dir();
        let dir_str = dir.to_string_lossy();

        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|a| a.replace(DIR_PLACEHOLDER, &dir_str)))
            .current_dir(&dir)
            .env(NETBOX_URL_VAR, &self.netbox_url)
            .env(NETBOX_TOKEN_VAR, &self.netbox_token)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Debug for LaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchConfig")
            .field("provider_dir", &self.provider_dir)
            .field("netbox_url", &self.netbox_url)
            .field("netbox_token", &"<redacted>")
            .field("allowed_tools", &self.allowed_tools)
            .field("program", &self.program)
            .field("args", &self.args)
            .field("artifact", &self.artifact)
            .finish()
    }
}

/// Check the artifact, spawn the provider, and hand back a connected bridge.
///
/// A missing artifact fails with [`McpError::ProviderNotFound`] without
/// starting any process.
pub async fn launch(config: &LaunchConfig) -> Result<FilteredBridge<StdioTransport>, McpError> {
    let artifact = config.artifact_path();
    ensure_artifact(&artifact)?;

    tracing::info!(
        program = %config.program,
        dir = %config.resolved_dir().display(),
        "Spawning MCP server"
    );

    let mut child = config.command().spawn().map_err(|source| McpError::SpawnFailed {
        program: config.program.clone(),
        source,
    })?;

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        return Err(McpError::ServerUnavailable(
            "child process has no stdio pipes".to_string(),
        ));
    };

    let transport = StdioTransport::new(stdin, stdout);
    // On handshake failure `child` drops here and kill_on_drop reaps it.
    let bridge = FilteredBridge::connect(transport, config.allowed_tools.clone()).await?;
    Ok(bridge.with_process(child))
}

fn ensure_artifact(path: &Path) -> Result<(), McpError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(McpError::ProviderNotFound {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[tokio::test]
    async fn test_missing_artifact_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        // A program that cannot exist: if launch tried to spawn it we would
        // see SpawnFailed instead.
        let config = LaunchConfig::new(dir.path(), "https://netbox.example.com", "tok")
            .with_command("/nonexistent/uv-binary", ["run"], "pyproject.toml");

        let err = launch(&config).await.err().unwrap();
        match err {
            McpError::ProviderNotFound { path } => {
                assert_eq!(path, dir.path().join("pyproject.toml"));
            }
            other => panic!("expected ProviderNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();
        let config = LaunchConfig::new(dir.path(), "https://netbox.example.com", "tok")
            .with_command("/nonexistent/uv-binary", ["run"], "pyproject.toml");

        let err = launch(&config).await.err().unwrap();
        assert!(matches!(err, McpError::SpawnFailed { .. }));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_credentials_only_in_environment() {
        let config = LaunchConfig::new("/opt/netbox-mcp-server", "https://netbox.example.com", "s3cret");
        let cmd = config.command();
        let std_cmd = cmd.as_std();

        let args: Vec<&OsStr> = std_cmd.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("--directory"),
                OsStr::new("/opt/netbox-mcp-server"),
                OsStr::new("run"),
                OsStr::new("netbox-mcp-server"),
            ]
        );
        assert!(args.iter().all(|a| !a.to_string_lossy().contains("s3cret")));

        let envs: Vec<(&OsStr, Option<&OsStr>)> = std_cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new(NETBOX_TOKEN_VAR), Some(OsStr::new("s3cret")))));
        assert!(envs.contains(&(
            OsStr::new(NETBOX_URL_VAR),
            Some(OsStr::new("https://netbox.example.com"))
        )));
        assert_eq!(
            std_cmd.get_current_dir(),
            Some(Path::new("/opt/netbox-mcp-server"))
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = LaunchConfig::new("/opt/mcp", "https://netbox.example.com", "s3cret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_default_allow_list() {
        let config = LaunchConfig::new("/opt/mcp", "u", "t");
        assert_eq!(config.allowed_tools.len(), 4);
        assert!(config.allowed_tools.iter().any(|t| t == "netbox_get_changelogs"));

        let narrowed = config.with_allowed_tools(["netbox_get_objects"]);
        assert_eq!(narrowed.allowed_tools, vec!["netbox_get_objects".to_string()]);
    }
}
