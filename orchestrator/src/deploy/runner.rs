//! Per-target deployment pipeline
//!
//! Runs one target's full copy/build/start/verify sequence. Every failure
//! is converted into the target's [`DeploymentResult`] here; nothing
//! escapes to sibling targets.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::deploy::script::{build_steps, CommandSet};
use crate::health::HealthProbe;
use crate::models::report::{DeploymentResult, Outcome, Phase};
use crate::models::target::Target;
use crate::secrets::{Credential, SecretStore};
use crate::supervisor::{BindSpec, ProcessStatus, ProcessSupervisor, SupervisorError};
use crate::transport::{Transport, TransportError};

/// Why a single target failed
#[derive(Debug, Error)]
pub enum TargetError {
    /// Copy or connection failure
    #[error("transport: {0}")]
    Transport(String),

    /// A remote step exited nonzero
    #[error("step {name}: {detail}")]
    Step { name: &'static str, detail: String },

    /// A bounded operation ran out of time
    #[error("timeout: {0}")]
    Timeout(String),

    /// The process started but never answered the probe
    #[error("health check: {0}")]
    HealthCheck(String),

    /// The run was aborted before this target completed
    #[error("cancelled before completion")]
    Cancelled,
}

/// Timing knobs for the per-target pipeline
#[derive(Debug, Clone)]
pub struct Options {
    /// Timeout for each remote step
    pub exec_timeout: Duration,

    /// Interval between supervisor status polls
    pub readiness_poll_interval: Duration,

    /// Give up on readiness after this long
    pub readiness_deadline: Duration,

    /// Pause between readiness and the liveness probe
    pub health_settle: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            exec_timeout: Duration::from_secs(600),
            readiness_poll_interval: Duration::from_secs(2),
            readiness_deadline: Duration::from_secs(60),
            health_settle: Duration::from_secs(5),
        }
    }
}

/// Runs the deployment pipeline for one target at a time
pub struct TargetRunner {
    transport: Arc<dyn Transport>,
    supervisor: Arc<dyn ProcessSupervisor>,
    secrets: Arc<dyn SecretStore>,
    health: Arc<dyn HealthProbe>,
    local_artifact: PathBuf,
    commands: CommandSet,
    options: Options,
}

impl TargetRunner {
    pub fn new(
        transport: Arc<dyn Transport>,
        supervisor: Arc<dyn ProcessSupervisor>,
        secrets: Arc<dyn SecretStore>,
        health: Arc<dyn HealthProbe>,
        local_artifact: PathBuf,
        commands: CommandSet,
        options: Options,
    ) -> Self {
        Self {
            transport,
            supervisor,
            secrets,
            health,
            local_artifact,
            commands,
            options,
        }
    }

    /// Run the full pipeline. Never returns an error; failures become the
    /// target's result.
    pub async fn deploy(&self, target: &Target) -> DeploymentResult {
        info!("Deploying target: {} ({})", target.label, target.host);
        let started = Instant::now();
        let mut phase: Option<Phase> = None;

        let error = self.pipeline(target, &mut phase).await.err();
        match &error {
            None => info!(
                "Target {} deployed successfully in {:?}",
                target.label,
                started.elapsed()
            ),
            Some(e) => warn!("Target {} failed: {}", target.label, e),
        }

        DeploymentResult {
            target_label: target.label.clone(),
            phase_reached: phase,
            outcome: if error.is_none() {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            error_detail: error.map(|e| e.to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn pipeline(
        &self,
        target: &Target,
        phase: &mut Option<Phase>,
    ) -> Result<(), TargetError> {
        let credential = self
            .secrets
            .resolve(&target.credential)
            .map_err(|e| TargetError::Transport(e.to_string()))?;

        self.transport
            .copy(target, &credential, &self.local_artifact)
            .await
            .map_err(|e| transport_failure("copy-artifact", e))?;
        *phase = Some(Phase::Copied);

        for step in build_steps(target, &self.commands) {
            let output = self
                .transport
                .exec(target, &credential, &step.script, self.options.exec_timeout)
                .await
                .map_err(|e| transport_failure(step.name, e))?;
            if !output.success() {
                return Err(TargetError::Step {
                    name: step.name,
                    detail: format!(
                        "exited with {}: {}",
                        output.exit_code,
                        output.output.trim()
                    ),
                });
            }
            if let Some(completed) = step.completes {
                *phase = Some(completed);
            }
        }

        let name = &target.process_name;
        self.supervisor
            .stop(target, &credential, name)
            .await
            .map_err(|e| supervisor_failure("stop-process", e))?;
        self.supervisor
            .delete(target, &credential, name)
            .await
            .map_err(|e| supervisor_failure("delete-process", e))?;

        let bind = BindSpec::all_interfaces(target.service_port);
        self.supervisor
            .start(target, &credential, name, &self.commands.start, &bind)
            .await
            .map_err(|e| supervisor_failure("start-process", e))?;
        self.supervisor
            .persist(target, &credential)
            .await
            .map_err(|e| supervisor_failure("persist-state", e))?;

        let home_dir = format!("/home/{}", credential.username);
        self.supervisor
            .enable_boot_autostart(target, &credential, &credential.username, &home_dir)
            .await
            .map_err(|e| supervisor_failure("enable-autostart", e))?;
        *phase = Some(Phase::ProcessStarted);

        self.await_running(target, &credential, name).await?;

        // Give the service a moment to bind its listener before probing
        tokio::time::sleep(self.options.health_settle).await;
        *phase = Some(Phase::HealthChecked);
        self.health
            .probe(target)
            .await
            .map_err(|e| TargetError::HealthCheck(e.to_string()))?;

        Ok(())
    }

    /// Poll the supervisor until the process reports online, bounded by
    /// the readiness deadline
    async fn await_running(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
    ) -> Result<(), TargetError> {
        let deadline = Instant::now() + self.options.readiness_deadline;
        loop {
            match self.supervisor.status(target, credential, name).await {
                Ok(ProcessStatus::Running) => return Ok(()),
                Ok(other) => debug!("Process {} on {} is {:?}", name, target.label, other),
                Err(e) => debug!("Status query for {} failed: {}", target.label, e),
            }

            if Instant::now() >= deadline {
                return Err(TargetError::Step {
                    name: "verify-running",
                    detail: format!(
                        "process {} not running after {:?}",
                        name, self.options.readiness_deadline
                    ),
                });
            }
            tokio::time::sleep(self.options.readiness_poll_interval).await;
        }
    }
}

fn transport_failure(step: &'static str, err: TransportError) -> TargetError {
    match err {
        TransportError::Timeout(elapsed) => {
            TargetError::Timeout(format!("step {} timed out after {:?}", step, elapsed))
        }
        other => TargetError::Transport(other.to_string()),
    }
}

fn supervisor_failure(step: &'static str, err: SupervisorError) -> TargetError {
    match err {
        SupervisorError::Transport(TransportError::Timeout(elapsed)) => {
            TargetError::Timeout(format!("step {} timed out after {:?}", step, elapsed))
        }
        SupervisorError::Transport(other) => TargetError::Transport(other.to_string()),
        other => TargetError::Step {
            name: step,
            detail: other.to_string(),
        },
    }
}
