//! SSH/SCP transport binding
//!
//! Shells out to the system `ssh` and `scp` binaries. Key material is
//! staged into a 0600 identity file for the duration of a single operation
//! and removed afterwards.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::process::Command;
use tracing::debug;

use crate::filesys::file::File;
use crate::models::target::Target;
use crate::secrets::Credential;
use crate::transport::{ExecOutput, Script, Transport, TransportError};

// ssh(1) reserves exit status 255 for connection and authentication errors
const SSH_CONNECTION_FAILURE: i32 = 255;

/// SSH transport options
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Path to the ssh binary
    pub ssh_binary: String,

    /// Path to the scp binary
    pub scp_binary: String,

    /// TCP connect timeout passed to ssh/scp
    pub connect_timeout: Duration,

    /// Overall timeout for one copy operation
    pub copy_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            scp_binary: "scp".to_string(),
            connect_timeout: Duration::from_secs(10),
            copy_timeout: Duration::from_secs(300),
        }
    }
}

/// Transport over the system ssh/scp binaries
pub struct SshTransport {
    options: SshOptions,
}

impl SshTransport {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    fn common_args(&self, identity: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            identity.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout.as_secs()),
        ]
    }

    async fn write_identity(&self, credential: &Credential) -> Result<File, TransportError> {
        let path = std::env::temp_dir().join(format!("flotilla-{}.key", uuid::Uuid::new_v4()));
        let file = File::new(path);
        file.write_string(credential.private_key.expose_secret())
            .await
            .map_err(|e| TransportError::Identity(e.to_string()))?;
        file.set_permissions_600()
            .await
            .map_err(|e| TransportError::Identity(e.to_string()))?;
        Ok(file)
    }

    async fn run_with_timeout(
        mut command: Command,
        timeout: Duration,
    ) -> Result<std::process::Output, TransportError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| TransportError::Connection(format!("failed to spawn: {}", e)))?;

        tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| TransportError::Connection(e.to_string()))
            }
            _ = tokio::time::sleep(timeout) => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn exec_with_identity(
        &self,
        target: &Target,
        credential: &Credential,
        identity: &Path,
        script: &Script,
        timeout: Duration,
    ) -> Result<ExecOutput, TransportError> {
        let destination = format!("{}@{}", credential.username, credential.address);
        let rendered = script.render();
        debug!("Executing on {}: {}", target.label, rendered);

        let mut command = Command::new(&self.options.ssh_binary);
        command.args(self.common_args(identity));
        command.arg(&destination);
        command.arg(&rendered);

        let output = Self::run_with_timeout(command, timeout).await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code().unwrap_or(-1);

        if exit_code == SSH_CONNECTION_FAILURE {
            return Err(TransportError::Connection(combined.trim().to_string()));
        }

        Ok(ExecOutput {
            exit_code,
            output: combined,
        })
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn copy(
        &self,
        target: &Target,
        credential: &Credential,
        local_artifact: &Path,
    ) -> Result<(), TransportError> {
        // Wholesale replacement: clear the destination first so no stale
        // files survive a redeploy
        let parent = Path::new(&target.artifact_path)
            .parent()
            .map(|p| p.display().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let clear = Script::new()
            .then(format!("rm -rf {}", target.artifact_path))
            .then(format!("mkdir -p {}", parent));

        let prepared = self
            .exec(target, credential, &clear, self.options.copy_timeout)
            .await?;
        if !prepared.success() {
            return Err(TransportError::Copy(format!(
                "failed to clear {}: {}",
                target.artifact_path,
                prepared.output.trim()
            )));
        }

        let identity = self.write_identity(credential).await?;
        let destination = format!(
            "{}@{}:{}",
            credential.username, credential.address, target.artifact_path
        );
        debug!(
            "Copying {} to {} ({})",
            local_artifact.display(),
            destination,
            target.label
        );

        let mut command = Command::new(&self.options.scp_binary);
        command.args(self.common_args(identity.path()));
        command.arg("-r");
        command.arg(local_artifact);
        command.arg(&destination);

        let result = Self::run_with_timeout(command, self.options.copy_timeout).await;
        let _ = identity.delete().await;
        let output = result?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Copy(stderr.trim().to_string()));
        }

        Ok(())
    }

    async fn exec(
        &self,
        target: &Target,
        credential: &Credential,
        script: &Script,
        timeout: Duration,
    ) -> Result<ExecOutput, TransportError> {
        let identity = self.write_identity(credential).await?;
        let result = self
            .exec_with_identity(target, credential, identity.path(), script, timeout)
            .await;
        let _ = identity.delete().await;
        result
    }
}
