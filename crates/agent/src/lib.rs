//! Compliance checks: build the task, run a bounded tool-using session
//! against NetBox, and classify the report.

pub mod classify;
pub mod driver;
pub mod error;
pub mod prompts;
pub mod session;
pub mod task;

pub use classify::{classify, ComplianceResult, Verdict};
pub use driver::{resolve_api_key, run_once, run_once_with_lookup, CheckOptions, ComplianceDriver};
pub use error::CheckError;
pub use session::{AgentSessionRunner, BridgeLauncher, SessionAnswer, SessionRunner, StdioLauncher};
pub use task::build_task_message;
