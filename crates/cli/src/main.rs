mod cli;
mod config;
mod terminal;

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use nbx_agent::{run_once, CheckError};
use nbx_core::config::load_dotenv;
use nbx_core::ComplianceConfig;

use crate::cli::{CheckArgs, CliArgs, Command};
use crate::config::{resolve_check, CliConfig};
use crate::terminal::Terminal;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIGURATION: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    let args = CliArgs::parse();

    // -v / -vv win over RUST_LOG; otherwise RUST_LOG, then warn.
    let filter = match args.verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        1 => tracing_subscriber::EnvFilter::new("info"),
        _ => tracing_subscriber::EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let terminal = Terminal::new();

    let file_config = match CliConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            terminal.print_error(&format!("{:#}", e)).ok();
            return ExitCode::from(EXIT_CONFIGURATION);
        }
    };
    let env_config = ComplianceConfig::from_env();
    env_config.log_summary();
    debug!(summary = %env_config.redacted_summary(), "Environment configuration");

    let outcome = match args.command {
        Command::Check(check) => run_check(&terminal, &check, &env_config, &file_config).await,
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Failed to write output");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run_check(
    terminal: &Terminal,
    args: &CheckArgs,
    env: &ComplianceConfig,
    file: &CliConfig,
) -> Result<ExitCode> {
    let options = match resolve_check(args, env, file) {
        Ok(options) => options,
        Err(e) => {
            terminal.print_error(&e.to_string())?;
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };

    if !args.json {
        terminal.print_preamble(&options.rule, &options.scope, &options.model)?;
    }
    info!(rule = %options.rule, scope = %options.scope, model = %options.model, "Starting check");

    let spinner = (!args.json)
        .then(|| terminal.start_spinner("Checking NetBox..."))
        .transpose()?;
    let start = Instant::now();
    let outcome = run_once(options).await;
    let elapsed = start.elapsed();
    if let Some(spinner) = spinner {
        spinner.stop();
    }

    match outcome {
        Ok(result) => {
            if args.json {
                terminal.print_json(&result)?;
            } else {
                terminal.print_report(&result, elapsed)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            terminal.print_error(&format!("Error running compliance check: {}", e))?;
            Ok(ExitCode::from(exit_code_for(&e)))
        }
    }
}

fn exit_code_for(err: &CheckError) -> u8 {
    if err.is_configuration() {
        EXIT_CONFIGURATION
    } else {
        EXIT_FAILURE
    }
}
