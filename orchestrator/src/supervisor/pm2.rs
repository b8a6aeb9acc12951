//! pm2 supervisor binding
//!
//! Drives a remote pm2 daemon over the transport. Status is read from
//! `pm2 jlist` instead of masking stop/delete exit codes with shell
//! fallbacks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::models::target::Target;
use crate::secrets::Credential;
use crate::supervisor::{BindSpec, ProcessStatus, ProcessSupervisor, SupervisorError};
use crate::transport::{ExecOutput, Script, Transport};

/// Supervisor over a remote pm2 install
pub struct Pm2Supervisor {
    transport: Arc<dyn Transport>,
    exec_timeout: Duration,
}

impl Pm2Supervisor {
    pub fn new(transport: Arc<dyn Transport>, exec_timeout: Duration) -> Self {
        Self {
            transport,
            exec_timeout,
        }
    }

    async fn run(
        &self,
        target: &Target,
        credential: &Credential,
        command: String,
    ) -> Result<ExecOutput, SupervisorError> {
        let output = self
            .transport
            .exec(target, credential, &Script::single(command), self.exec_timeout)
            .await?;
        Ok(output)
    }

    async fn run_checked(
        &self,
        target: &Target,
        credential: &Credential,
        command: String,
    ) -> Result<(), SupervisorError> {
        let output = self.run(target, credential, command.clone()).await?;
        if !output.success() {
            return Err(SupervisorError::Command(format!(
                "`{}` exited with {}: {}",
                command,
                output.exit_code,
                output.output.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn start(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
        command: &str,
        bind: &BindSpec,
    ) -> Result<(), SupervisorError> {
        let start = format!(
            "pm2 start \"{} --host {} --port {}\" --name {}",
            command, bind.host, bind.port, name
        );
        self.run_checked(target, credential, start).await
    }

    async fn stop(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
    ) -> Result<(), SupervisorError> {
        if self.status(target, credential, name).await? == ProcessStatus::Absent {
            debug!("Process {} absent on {}, nothing to stop", name, target.label);
            return Ok(());
        }
        self.run_checked(target, credential, format!("pm2 stop {}", name))
            .await
    }

    async fn delete(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
    ) -> Result<(), SupervisorError> {
        if self.status(target, credential, name).await? == ProcessStatus::Absent {
            debug!("Process {} absent on {}, nothing to delete", name, target.label);
            return Ok(());
        }
        self.run_checked(target, credential, format!("pm2 delete {}", name))
            .await
    }

    async fn status(
        &self,
        target: &Target,
        credential: &Credential,
        name: &str,
    ) -> Result<ProcessStatus, SupervisorError> {
        let output = self
            .run(target, credential, "pm2 jlist".to_string())
            .await?;
        if !output.success() {
            return Err(SupervisorError::Command(format!(
                "`pm2 jlist` exited with {}: {}",
                output.exit_code,
                output.output.trim()
            )));
        }
        parse_jlist_status(&output.output, name)
    }

    async fn persist(
        &self,
        target: &Target,
        credential: &Credential,
    ) -> Result<(), SupervisorError> {
        self.run_checked(target, credential, "pm2 save".to_string())
            .await
    }

    async fn enable_boot_autostart(
        &self,
        target: &Target,
        credential: &Credential,
        user: &str,
        home_dir: &str,
    ) -> Result<(), SupervisorError> {
        // pm2 startup rewrites the existing unit, so re-registering does
        // not accumulate boot entries
        let startup = format!("pm2 startup systemd -u {} --hp {}", user, home_dir);
        self.run_checked(target, credential, startup).await
    }
}

/// Find `name` in `pm2 jlist` output
fn parse_jlist_status(output: &str, name: &str) -> Result<ProcessStatus, SupervisorError> {
    // pm2 may prepend update notices; the JSON array starts at the first bracket
    let start = output
        .find('[')
        .ok_or_else(|| SupervisorError::Status(output.trim().to_string()))?;
    let list: serde_json::Value = serde_json::from_str(output[start..].trim())
        .map_err(|e| SupervisorError::Status(e.to_string()))?;
    let entries = list
        .as_array()
        .ok_or_else(|| SupervisorError::Status("expected a JSON array".to_string()))?;

    for entry in entries {
        if entry.get("name").and_then(|n| n.as_str()) == Some(name) {
            let status = entry
                .pointer("/pm2_env/status")
                .and_then(|s| s.as_str())
                .unwrap_or("unknown");
            return Ok(if status == "online" {
                ProcessStatus::Running
            } else {
                ProcessStatus::Stopped
            });
        }
    }

    Ok(ProcessStatus::Absent)
}
