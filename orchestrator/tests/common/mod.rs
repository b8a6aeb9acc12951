//! Shared test doubles for the deployment pipeline
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use flotilla::deploy::runner::{Options as RunnerOptions, TargetRunner};
use flotilla::deploy::script::CommandSet;
use flotilla::errors::OrchestratorError;
use flotilla::health::{HealthCheckError, HealthProbe};
use flotilla::models::target::Target;
use flotilla::secrets::{Credential, SecretStore};
use flotilla::supervisor::{BindSpec, ProcessStatus, ProcessSupervisor, SupervisorError};
use flotilla::transport::{ExecOutput, Script, Transport, TransportError};

pub fn target(label: &str) -> Target {
    Target {
        label: label.to_string(),
        host: "127.0.0.1".to_string(),
        credential: "default".to_string(),
        artifact_path: format!("/srv/{}", label),
        process_name: "app".to_string(),
        service_port: 4200,
    }
}

/// Resolves every reference to the same throwaway credential
pub struct StaticSecretStore;

impl SecretStore for StaticSecretStore {
    fn resolve(&self, _reference: &str) -> Result<Credential, OrchestratorError> {
        Ok(Credential {
            address: "127.0.0.1".to_string(),
            username: "deploy".to_string(),
            private_key: SecretString::from("test-key".to_string()),
        })
    }
}

/// Transport double: records calls, fails where instructed
#[derive(Default)]
pub struct MockTransport {
    /// Labels whose copy raises a connection error
    pub copy_failures: Mutex<HashSet<String>>,

    /// Label -> command fragment that exits nonzero
    pub step_failures: Mutex<HashMap<String, String>>,

    /// Label -> command fragment that times out
    pub timeout_failures: Mutex<HashMap<String, String>>,

    /// Artificial delay before any copy completes
    pub copy_delay: Mutex<Option<Duration>>,

    pub copies: Mutex<Vec<String>>,
    pub execs: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn copy(
        &self,
        target: &Target,
        _credential: &Credential,
        _local_artifact: &Path,
    ) -> Result<(), TransportError> {
        let delay = *self.copy_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.copy_failures.lock().unwrap().contains(&target.label) {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        self.copies.lock().unwrap().push(target.label.clone());
        Ok(())
    }

    async fn exec(
        &self,
        target: &Target,
        _credential: &Credential,
        script: &Script,
        timeout: Duration,
    ) -> Result<ExecOutput, TransportError> {
        let rendered = script.render();
        self.execs
            .lock()
            .unwrap()
            .push((target.label.clone(), rendered.clone()));

        if let Some(fragment) = self.timeout_failures.lock().unwrap().get(&target.label) {
            if rendered.contains(fragment.as_str()) {
                return Err(TransportError::Timeout(timeout));
            }
        }
        if let Some(fragment) = self.step_failures.lock().unwrap().get(&target.label) {
            if rendered.contains(fragment.as_str()) {
                return Ok(ExecOutput {
                    exit_code: 1,
                    output: "boom".to_string(),
                });
            }
        }
        Ok(ExecOutput {
            exit_code: 0,
            output: String::new(),
        })
    }
}

/// In-memory supervisor double keyed by (label, process name)
#[derive(Default)]
pub struct MockSupervisor {
    pub processes: Mutex<HashMap<(String, String), ProcessStatus>>,
    pub boot_entries: Mutex<HashSet<(String, String)>>,
    pub saves: Mutex<Vec<String>>,
    pub stop_calls: Mutex<Vec<String>>,

    /// Labels whose start command fails
    pub start_failures: Mutex<HashSet<String>>,

    /// Labels whose process starts but never comes online
    pub start_leaves_stopped: Mutex<HashSet<String>>,
}

impl MockSupervisor {
    pub fn process_status(&self, label: &str, name: &str) -> ProcessStatus {
        self.processes
            .lock()
            .unwrap()
            .get(&(label.to_string(), name.to_string()))
            .copied()
            .unwrap_or(ProcessStatus::Absent)
    }
}

#[async_trait]
impl ProcessSupervisor for MockSupervisor {
    async fn start(
        &self,
        target: &Target,
        _credential: &Credential,
        name: &str,
        _command: &str,
        _bind: &BindSpec,
    ) -> Result<(), SupervisorError> {
        if self.start_failures.lock().unwrap().contains(&target.label) {
            return Err(SupervisorError::Command("start failed".to_string()));
        }
        let status = if self
            .start_leaves_stopped
            .lock()
            .unwrap()
            .contains(&target.label)
        {
            ProcessStatus::Stopped
        } else {
            ProcessStatus::Running
        };
        self.processes
            .lock()
            .unwrap()
            .insert((target.label.clone(), name.to_string()), status);
        Ok(())
    }

    async fn stop(
        &self,
        target: &Target,
        _credential: &Credential,
        name: &str,
    ) -> Result<(), SupervisorError> {
        self.stop_calls.lock().unwrap().push(target.label.clone());
        let mut processes = self.processes.lock().unwrap();
        if let Some(status) = processes.get_mut(&(target.label.clone(), name.to_string())) {
            *status = ProcessStatus::Stopped;
        }
        // absent is not an error
        Ok(())
    }

    async fn delete(
        &self,
        target: &Target,
        _credential: &Credential,
        name: &str,
    ) -> Result<(), SupervisorError> {
        self.processes
            .lock()
            .unwrap()
            .remove(&(target.label.clone(), name.to_string()));
        Ok(())
    }

    async fn status(
        &self,
        target: &Target,
        _credential: &Credential,
        name: &str,
    ) -> Result<ProcessStatus, SupervisorError> {
        Ok(self.process_status(&target.label, name))
    }

    async fn persist(
        &self,
        target: &Target,
        _credential: &Credential,
    ) -> Result<(), SupervisorError> {
        self.saves.lock().unwrap().push(target.label.clone());
        Ok(())
    }

    async fn enable_boot_autostart(
        &self,
        target: &Target,
        _credential: &Credential,
        user: &str,
        _home_dir: &str,
    ) -> Result<(), SupervisorError> {
        self.boot_entries
            .lock()
            .unwrap()
            .insert((target.label.clone(), user.to_string()));
        Ok(())
    }
}

/// Probe double that fails for chosen labels
#[derive(Default)]
pub struct MockHealth {
    pub fail_labels: Mutex<HashSet<String>>,
}

#[async_trait]
impl HealthProbe for MockHealth {
    async fn probe(&self, target: &Target) -> Result<(), HealthCheckError> {
        if self.fail_labels.lock().unwrap().contains(&target.label) {
            return Err(HealthCheckError {
                url: format!("http://{}:{}/", target.host, target.service_port),
                detail: "probe timed out".to_string(),
            });
        }
        Ok(())
    }
}

/// Runner options tightened for tests
pub fn fast_options() -> RunnerOptions {
    RunnerOptions {
        exec_timeout: Duration::from_secs(5),
        readiness_poll_interval: Duration::from_millis(10),
        readiness_deadline: Duration::from_millis(200),
        health_settle: Duration::from_millis(0),
    }
}

/// A runner wired to inspectable doubles
pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub supervisor: Arc<MockSupervisor>,
    pub health: Arc<MockHealth>,
    pub runner: Arc<TargetRunner>,
}

pub fn harness() -> Harness {
    let transport = Arc::new(MockTransport::default());
    let supervisor = Arc::new(MockSupervisor::default());
    let health = Arc::new(MockHealth::default());
    let runner = Arc::new(TargetRunner::new(
        transport.clone(),
        supervisor.clone(),
        Arc::new(StaticSecretStore),
        health.clone(),
        PathBuf::from("."),
        CommandSet::default(),
        fast_options(),
    ));
    Harness {
        transport,
        supervisor,
        health,
        runner,
    }
}
