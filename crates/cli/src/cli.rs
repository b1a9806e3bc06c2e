use clap::{ArgAction, Args, Parser, Subcommand};

/// NetBox compliance checking using AI agents and MCP.
#[derive(Parser, Debug)]
#[command(name = "netbox-agent-compliance", version, about)]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/netbox-agent-compliance/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a compliance check against NetBox
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Natural language compliance rule to check (e.g., 'every interface should have an assigned ip address')
    pub rule: String,

    /// Site name to scope the compliance check
    #[arg(long)]
    pub site: Option<String>,

    /// Rack name to scope the compliance check
    #[arg(long)]
    pub rack: Option<String>,

    /// Device name to scope the compliance check
    #[arg(long)]
    pub device: Option<String>,

    /// Model to use (e.g., openai/gpt-5-nano, anthropic/claude-sonnet-4-20250514)
    #[arg(long, env = "NBX_MODEL")]
    pub model: Option<String>,

    /// API key for the model provider
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// NetBox instance URL
    #[arg(long, env = "NETBOX_URL")]
    pub netbox_url: Option<String>,

    /// NetBox API token
    #[arg(long, env = "NETBOX_TOKEN", hide_env_values = true)]
    pub netbox_token: Option<String>,

    /// Directory containing the NetBox MCP server
    #[arg(long, env = "MCP_SERVER_DIR")]
    pub mcp_dir: Option<String>,

    /// Limit the number of objects to check (for demo purposes)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Maximum number of agent steps (default: 25)
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Print the result object as JSON instead of the formatted report
    #[arg(long)]
    pub json: bool,

    /// Append worked example scenarios to the agent's instructions
    #[arg(long)]
    pub include_examples: bool,
}

impl CheckArgs {
    /// Scope filters in site, rack, device order. Empty values count as unset.
    pub fn filters(&self) -> [Option<&str>; 3] {
        [&self.site, &self.rack, &self.device].map(|v| v.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check() {
        let args = CliArgs::try_parse_from([
            "netbox-agent-compliance",
            "-v",
            "check",
            "every device must have a primary IP",
            "--site",
            "DM-Akron",
            "--limit",
            "5",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.verbose, 1);
        let Command::Check(check) = args.command;
        assert_eq!(check.rule, "every device must have a primary IP");
        assert_eq!(check.filters(), [Some("DM-Akron"), None, None]);
        assert_eq!(check.limit, Some(5));
        assert!(check.json);
        assert!(!check.include_examples);
    }

    #[test]
    fn test_blank_filter_is_unset() {
        let args = CliArgs::try_parse_from([
            "netbox-agent-compliance",
            "check",
            "rule",
            "--rack",
            "",
            "--device",
            "sw01",
        ])
        .unwrap();
        let Command::Check(check) = args.command;
        assert_eq!(check.filters(), [None, None, Some("sw01")]);
    }

    #[test]
    fn test_rule_is_required() {
        assert!(CliArgs::try_parse_from(["netbox-agent-compliance", "check"]).is_err());
    }
}
