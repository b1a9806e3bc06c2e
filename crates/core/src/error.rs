use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("at least one scope (site, rack, or device) must be specified")]
    Empty,

    #[error("scope '{key}' has an empty name or value")]
    BlankValue { key: String },
}
