//! Bounded-concurrency deployment fan-out
//!
//! One task per target, at most `concurrency_limit` in flight. Targets are
//! fail-independent: a sibling's failure never aborts or skips another
//! target's attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{broadcast, Semaphore};
use tracing::{error, info};

use crate::deploy::runner::{TargetError, TargetRunner};
use crate::errors::OrchestratorError;
use crate::models::report::{DeploymentResult, Outcome};
use crate::models::target::{Target, TargetRegistry};

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum targets in flight at once
    pub concurrency_limit: usize,

    /// Abandon the whole run after this long
    pub run_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            concurrency_limit: 2,
            run_timeout: None,
        }
    }
}

/// Fans the per-target pipeline out over a registry
pub struct DeploymentOrchestrator {
    runner: Arc<TargetRunner>,
    options: Options,
}

impl DeploymentOrchestrator {
    pub fn new(runner: Arc<TargetRunner>, options: Options) -> Result<Self, OrchestratorError> {
        if options.concurrency_limit == 0 {
            return Err(OrchestratorError::ConfigError(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(Self { runner, options })
    }

    /// Deploy every target in the registry. Returns exactly one result per
    /// target, in registry order, regardless of completion order.
    pub async fn run(
        &self,
        registry: &TargetRegistry,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Vec<DeploymentResult> {
        info!(
            "Deploying {} target(s) with concurrency {}",
            registry.len(),
            self.options.concurrency_limit
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency_limit));
        let mut labels = Vec::with_capacity(registry.len());
        let mut handles = Vec::with_capacity(registry.len());

        for target in registry.targets() {
            let runner = self.runner.clone();
            let target = target.clone();
            let semaphore = semaphore.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();

            labels.push(target.label.clone());
            handles.push(tokio::spawn(async move {
                let started = Instant::now();

                // Targets still queued when shutdown fires are recorded as
                // cancelled without an attempt
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return cancelled_result(&target, started),
                    },
                    _ = shutdown_rx.recv() => return cancelled_result(&target, started),
                };

                // In-flight remote work is abandoned best-effort on shutdown
                tokio::select! {
                    result = runner.deploy(&target) => result,
                    _ = shutdown_rx.recv() => cancelled_result(&target, started),
                }
            }));
        }

        // Every task has subscribed by now, so the timer cannot fire into
        // an empty channel
        if let Some(run_timeout) = self.options.run_timeout {
            let tx = shutdown_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(run_timeout).await;
                info!(
                    "Run timeout ({:?}) reached, abandoning remaining targets",
                    run_timeout
                );
                let _ = tx.send(());
            });
        }

        let mut results = Vec::with_capacity(handles.len());
        for (label, joined) in labels.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("Deployment task for {} aborted: {}", label, e);
                    results.push(DeploymentResult {
                        target_label: label,
                        phase_reached: None,
                        outcome: Outcome::Failure,
                        error_detail: Some(format!("deployment task aborted: {}", e)),
                        duration_ms: 0,
                    });
                }
            }
        }
        results
    }
}

fn cancelled_result(target: &Target, started: Instant) -> DeploymentResult {
    DeploymentResult {
        target_label: target.label.clone(),
        phase_reached: None,
        outcome: Outcome::Failure,
        error_detail: Some(TargetError::Cancelled.to_string()),
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
