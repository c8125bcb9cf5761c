//! Error types for forge-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unresolvable configuration (role names, task names, YAML)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The manager could not produce a viable delegation
    #[error("planning error: {0}")]
    Planning(String),

    /// A task failed after retries and escalation
    #[error("execution error: {0}")]
    Execution(String),

    /// Workspace I/O failure or confinement violation
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Archive packaging failure
    #[error("packaging error: {0}")]
    Packaging(String),

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] forge_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
