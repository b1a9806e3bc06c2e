pub mod config;
pub mod error;
pub mod scope;

pub use config::{ComplianceConfig, LlmEndpoints, LlmSettings};
pub use error::*;
pub use scope::Scope;
