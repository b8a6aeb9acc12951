//! Main run flow
//!
//! Loads the registry and secrets, wires the transport, supervisor, health
//! checker and orchestrator together, and runs one deployment pass.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use crate::app::options::AppOptions;
use crate::config::Settings;
use crate::deploy::orchestrator::DeploymentOrchestrator;
use crate::deploy::runner::TargetRunner;
use crate::errors::OrchestratorError;
use crate::filesys::file::File;
use crate::health::{HealthProbe, HttpHealthChecker};
use crate::models::report::RunSummary;
use crate::report;
use crate::secrets::{FileSecretStore, SecretStore};
use crate::supervisor::{Pm2Supervisor, ProcessSupervisor};
use crate::transport::{SshTransport, Transport};

/// Run one deployment pass over the configured targets
pub async fn run(
    run_id: String,
    settings: Settings,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<RunSummary, OrchestratorError> {
    let started_at = Utc::now();

    // Configuration errors are fatal and abort before any target is touched
    let registry = settings.registry()?;

    let concurrency = options
        .concurrency_override
        .unwrap_or(settings.concurrency_limit);

    let artifact_meta = tokio::fs::metadata(&settings.local_artifact)
        .await
        .map_err(|e| {
            OrchestratorError::ConfigError(format!(
                "local artifact {} is not readable: {}",
                settings.local_artifact.display(),
                e
            ))
        })?;
    if !artifact_meta.is_dir() {
        return Err(OrchestratorError::ConfigError(format!(
            "local artifact {} is not a directory",
            settings.local_artifact.display()
        )));
    }

    let secrets: Arc<dyn SecretStore> =
        Arc::new(FileSecretStore::load(&File::new(&options.secrets_path)).await?);

    // Resolve every reference up front so a bad registry fails the run
    // before any remote call
    for target in registry.targets() {
        secrets.resolve(&target.credential)?;
    }

    let transport: Arc<dyn Transport> = Arc::new(SshTransport::new(settings.ssh_options()));
    let supervisor: Arc<dyn ProcessSupervisor> = Arc::new(Pm2Supervisor::new(
        transport.clone(),
        settings.runner_options().exec_timeout,
    ));
    let health: Arc<dyn HealthProbe> = Arc::new(HttpHealthChecker::new(
        std::time::Duration::from_secs(settings.probe_timeout_secs),
    )?);

    let runner = Arc::new(TargetRunner::new(
        transport,
        supervisor,
        secrets,
        health,
        settings.local_artifact.clone(),
        settings.commands.clone(),
        settings.runner_options(),
    ));
    let orchestrator =
        DeploymentOrchestrator::new(runner, settings.orchestrator_options(concurrency))?;

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal.await;
            info!("Shutdown signal received, abandoning remaining targets...");
            let _ = tx.send(());
        });
    }

    let results = orchestrator.run(&registry, shutdown_tx).await;
    Ok(report::aggregate(run_id, started_at, results))
}
