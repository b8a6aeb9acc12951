//! Process supervisor abstraction
//!
//! The pipeline only depends on this trait; the pm2 binding lives in
//! [`pm2`]. Stop and delete follow absent-is-success semantics: asking to
//! stop a process that does not exist is a no-op, not an error.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::target::Target;
use crate::secrets::Credential;
use crate::transport::TransportError;

pub mod pm2;

pub use pm2::Pm2Supervisor;

/// Error raised by supervisor operations
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// A supervisor command exited nonzero
    #[error("command failed: {0}")]
    Command(String),

    /// Status output could not be interpreted
    #[error("unparseable status output: {0}")]
    Status(String),
}

/// State of a managed process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Stopped,
    Absent,
}

/// Listener binding for a started process
#[derive(Debug, Clone)]
pub struct BindSpec {
    pub host: String,
    pub port: u16,
}

impl BindSpec {
    /// Bind to every interface, not just loopback
    pub fn all_interfaces(port: u16) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
        }
    }
}

/// Remote process manager operations used by the deployment pipeline
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Start the process under `name`, listening per `bind`
    async fn start(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
        command: &str,
        bind: &BindSpec,
    ) -> Result<(), SupervisorError>;

    /// Stop the process; succeeds when it is absent
    async fn stop(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
    ) -> Result<(), SupervisorError>;

    /// Remove the process definition; succeeds when it is absent
    async fn delete(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
    ) -> Result<(), SupervisorError>;

    /// Query the process state
    async fn status(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
    ) -> Result<ProcessStatus, SupervisorError>;

    /// Persist the process list so it survives supervisor restarts
    async fn persist(
        &self,
        target: &Target,
        credential: &Credential,
    ) -> Result<(), SupervisorError>;

    /// Register the supervisor to launch at host boot; re-registering must
    /// not create duplicate boot entries
    async fn enable_boot_autostart(
        &self,
        target: &Target,
        credential: &Credential,
        user: &str,
        home_dir: &str,
    ) -> Result<(), SupervisorError>;
}
