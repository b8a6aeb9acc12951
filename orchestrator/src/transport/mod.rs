//! Remote transport abstraction
//!
//! The orchestrator depends only on the two operations here: replace a
//! remote directory with a local tree, and run a command sequence on the
//! host. The SSH binding lives in [`ssh`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::target::Target;
use crate::secrets::Credential;

pub mod ssh;

pub use ssh::{SshOptions, SshTransport};

/// Error raised by transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach or authenticate with the host
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote copy itself failed after the connection was established
    #[error("copy failed: {0}")]
    Copy(String),

    /// The operation did not finish within its allotted time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Could not stage the identity file locally
    #[error("identity file error: {0}")]
    Identity(String),
}

/// Output of a remote command
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Remote exit code, -1 when terminated by a signal
    pub exit_code: i32,

    /// Combined stdout and stderr
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// An ordered command sequence executed in a single remote shell session,
/// so working-directory and environment state persist across commands
#[derive(Debug, Clone, Default)]
pub struct Script {
    commands: Vec<String>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(command: impl Into<String>) -> Self {
        Self::new().then(command)
    }

    /// Append a command to the sequence
    pub fn then(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Render as a single shell command line; later commands only run if
    /// earlier ones succeed
    pub fn render(&self) -> String {
        self.commands.join(" && ")
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Remote host access used by the deployment pipeline
#[async_trait]
pub trait Transport: Send + Sync {
    /// Replace the remote artifact directory wholesale with the local tree.
    /// The destination not pre-existing is not an error.
    async fn copy(
        &self,
        target: &Target,
        credential: &Credential,
        local_artifact: &Path,
    ) -> Result<(), TransportError>;

    /// Run a script on the remote host, bounded by `timeout`. A nonzero
    /// remote exit status is returned in [`ExecOutput`], not as an error;
    /// exceeding the timeout is an error distinct from a nonzero exit.
    async fn exec(
        &self,
        target: &Target,
        credential: &Credential,
        script: &Script,
        timeout: Duration,
    ) -> Result<ExecOutput, TransportError>;
}
