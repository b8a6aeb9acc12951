//! Deployment target models

use serde::{Deserialize, Serialize};

use crate::errors::OrchestratorError;

/// A single remote machine the application is deployed to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Unique label identifying this target in logs and reports
    pub label: String,

    /// Hostname or IP the health probe connects to
    pub host: String,

    /// Opaque reference resolved through the secret store
    pub credential: String,

    /// Remote directory the artifact is copied into
    pub artifact_path: String,

    /// Name the application runs under in the process supervisor
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Port the deployed service listens on
    #[serde(default = "default_service_port")]
    pub service_port: u16,
}

fn default_process_name() -> String {
    "app".to_string()
}

fn default_service_port() -> u16 {
    4200
}

/// The validated, read-only set of targets for one run
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Build a registry, rejecting duplicate labels
    pub fn new(targets: Vec<Target>) -> Result<Self, OrchestratorError> {
        let mut seen = std::collections::HashSet::new();
        for target in &targets {
            if !seen.insert(target.label.as_str()) {
                return Err(OrchestratorError::ConfigError(format!(
                    "duplicate target label: {}",
                    target.label
                )));
            }
        }
        Ok(Self { targets })
    }

    /// Targets in their configured order
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
