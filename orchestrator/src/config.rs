//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deploy::orchestrator;
use crate::deploy::runner;
use crate::deploy::script::CommandSet;
use crate::errors::OrchestratorError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::models::target::{Target, TargetRegistry};
use crate::transport::SshOptions;

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Local directory shipped to every target
    pub local_artifact: PathBuf,

    /// Deployment targets
    #[serde(default)]
    pub targets: Vec<Target>,

    /// Maximum targets deployed at once
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Remote commands run inside the working directory
    #[serde(default)]
    pub commands: CommandSet,

    /// Timeout per remote step in seconds
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,

    /// Timeout for one artifact copy in seconds
    #[serde(default = "default_copy_timeout_secs")]
    pub copy_timeout_secs: u64,

    /// SSH connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Health probe timeout in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Pause between process readiness and the health probe, in seconds
    #[serde(default = "default_health_settle_secs")]
    pub health_settle_secs: u64,

    /// Interval between supervisor status polls, in seconds
    #[serde(default = "default_readiness_poll_secs")]
    pub readiness_poll_secs: u64,

    /// Give up on process readiness after this many seconds
    #[serde(default = "default_readiness_deadline_secs")]
    pub readiness_deadline_secs: u64,

    /// Abandon the whole run after this many seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

fn default_concurrency_limit() -> usize {
    2
}

fn default_exec_timeout_secs() -> u64 {
    600
}

fn default_copy_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_health_settle_secs() -> u64 {
    5
}

fn default_readiness_poll_secs() -> u64 {
    2
}

fn default_readiness_deadline_secs() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            local_artifact: PathBuf::from("."),
            targets: Vec::new(),
            concurrency_limit: default_concurrency_limit(),
            commands: CommandSet::default(),
            exec_timeout_secs: default_exec_timeout_secs(),
            copy_timeout_secs: default_copy_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            health_settle_secs: default_health_settle_secs(),
            readiness_poll_secs: default_readiness_poll_secs(),
            readiness_deadline_secs: default_readiness_deadline_secs(),
            run_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(file: &File) -> Result<Self, OrchestratorError> {
        file.read_json().await
    }

    /// Validate the registry: unique labels, immutable for the run
    pub fn registry(&self) -> Result<TargetRegistry, OrchestratorError> {
        TargetRegistry::new(self.targets.clone())
    }

    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            copy_timeout: Duration::from_secs(self.copy_timeout_secs),
            ..SshOptions::default()
        }
    }

    pub fn runner_options(&self) -> runner::Options {
        runner::Options {
            exec_timeout: Duration::from_secs(self.exec_timeout_secs),
            readiness_poll_interval: Duration::from_secs(self.readiness_poll_secs),
            readiness_deadline: Duration::from_secs(self.readiness_deadline_secs),
            health_settle: Duration::from_secs(self.health_settle_secs),
        }
    }

    pub fn orchestrator_options(&self, concurrency_limit: usize) -> orchestrator::Options {
        orchestrator::Options {
            concurrency_limit,
            run_timeout: self.run_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_settings_get_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "local_artifact": "dist",
                "targets": [
                    {"label": "vm1", "host": "10.0.0.1", "credential": "vm1", "artifact_path": "/srv/app"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(settings.concurrency_limit, 2);
        assert_eq!(settings.commands.install, "npm ci");
        assert_eq!(settings.targets[0].process_name, "app");
        assert_eq!(settings.targets[0].service_port, 4200);
        assert_eq!(settings.run_timeout_secs, None);
    }

    #[test]
    fn test_registry_validation_flows_through() {
        let mut settings = Settings::default();
        settings.targets = vec![
            serde_json::from_str(
                r#"{"label": "vm1", "host": "a", "credential": "c", "artifact_path": "/srv"}"#,
            )
            .unwrap(),
            serde_json::from_str(
                r#"{"label": "vm1", "host": "b", "credential": "c", "artifact_path": "/srv"}"#,
            )
            .unwrap(),
        ];
        assert!(settings.registry().is_err());
    }
}
