//! Error types for the flotilla orchestrator

use thiserror::Error;

/// Main error type for the orchestrator
///
/// These errors are fatal for the run as a whole. Failures inside a single
/// target's pipeline use `deploy::runner::TargetError` instead and never
/// escape the per-target boundary.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Secret error: {0}")]
    SecretError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}
