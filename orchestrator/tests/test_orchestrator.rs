//! Orchestrator fan-out tests

mod common;

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use common::{harness, target, Harness};
use flotilla::deploy::orchestrator::{DeploymentOrchestrator, Options};
use flotilla::models::report::{DeploymentResult, Outcome, OverallOutcome, Phase};
use flotilla::models::target::TargetRegistry;
use flotilla::report;

fn registry(labels: &[&str]) -> TargetRegistry {
    TargetRegistry::new(labels.iter().map(|label| target(label)).collect()).unwrap()
}

async fn run_with(h: &Harness, registry: &TargetRegistry, k: usize) -> Vec<DeploymentResult> {
    let orchestrator = DeploymentOrchestrator::new(
        h.runner.clone(),
        Options {
            concurrency_limit: k,
            run_timeout: None,
        },
    )
    .unwrap();
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
    orchestrator.run(registry, shutdown_tx).await
}

#[tokio::test]
async fn test_one_result_per_target_in_registry_order() {
    let h = harness();
    let registry = registry(&["vm3", "vm1", "vm2"]);

    for k in [1usize, 2, 3] {
        let results = run_with(&h, &registry, k).await;
        let labels: Vec<_> = results.iter().map(|r| r.target_label.as_str()).collect();
        assert_eq!(labels, vec!["vm3", "vm1", "vm2"]);
        assert!(results.iter().all(|r| r.outcome == Outcome::Success));
    }
}

#[tokio::test]
async fn test_copy_failure_is_isolated_from_sibling() {
    // vm1's copy raises a connection error, vm2 still runs to completion
    let h = harness();
    h.transport.copy_failures.lock().unwrap().insert("vm1".to_string());

    let results = run_with(&h, &registry(&["vm1", "vm2"]), 2).await;

    assert_eq!(results[0].target_label, "vm1");
    assert_eq!(results[0].outcome, Outcome::Failure);
    assert_eq!(results[0].phase_reached, None);
    assert_eq!(results[1].target_label, "vm2");
    assert_eq!(results[1].outcome, Outcome::Success);
    assert_eq!(results[1].phase_reached, Some(Phase::HealthChecked));

    let summary = report::aggregate("run".to_string(), Utc::now(), results);
    assert_eq!(summary.overall_outcome, OverallOutcome::PartialFailure);
    assert_ne!(report::exit_code(&summary), 0);
}

#[tokio::test]
async fn test_build_failure_does_not_block_sibling() {
    let h = harness();
    h.transport
        .step_failures
        .lock()
        .unwrap()
        .insert("vm1".to_string(), "npm run build".to_string());

    let results = run_with(&h, &registry(&["vm1", "vm2"]), 2).await;

    assert_eq!(results[0].outcome, Outcome::Failure);
    assert_eq!(results[1].outcome, Outcome::Success);
}

#[tokio::test]
async fn test_all_failed_outcome() {
    let h = harness();
    {
        let mut failures = h.transport.copy_failures.lock().unwrap();
        failures.insert("vm1".to_string());
        failures.insert("vm2".to_string());
    }

    let results = run_with(&h, &registry(&["vm1", "vm2"]), 2).await;
    let summary = report::aggregate("run".to_string(), Utc::now(), results);
    assert_eq!(summary.overall_outcome, OverallOutcome::AllFailed);
}

#[tokio::test]
async fn test_empty_registry_is_trivial_success() {
    let h = harness();
    let results = run_with(&h, &TargetRegistry::default(), 2).await;

    assert!(results.is_empty());
    let summary = report::aggregate("run".to_string(), Utc::now(), results);
    assert_eq!(summary.overall_outcome, OverallOutcome::AllSucceeded);
    assert_eq!(report::exit_code(&summary), 0);
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let h = harness();
    let result = DeploymentOrchestrator::new(
        h.runner.clone(),
        Options {
            concurrency_limit: 0,
            run_timeout: None,
        },
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_and_queued_targets() {
    let h = harness();
    *h.transport.copy_delay.lock().unwrap() = Some(Duration::from_secs(30));
    let registry = registry(&["vm1", "vm2", "vm3"]);

    let orchestrator = DeploymentOrchestrator::new(
        h.runner.clone(),
        Options {
            concurrency_limit: 1,
            run_timeout: None,
        },
    )
    .unwrap();
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    let run = {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move { orchestrator.run(&registry, tx).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = shutdown_tx.send(());

    let results = run.await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.outcome == Outcome::Failure));
    assert!(results
        .iter()
        .all(|r| r.error_detail.as_deref() == Some("cancelled before completion")));
}

#[tokio::test]
async fn test_run_timeout_abandons_remaining_targets() {
    let h = harness();
    *h.transport.copy_delay.lock().unwrap() = Some(Duration::from_secs(30));
    let registry = registry(&["vm1", "vm2"]);

    let orchestrator = DeploymentOrchestrator::new(
        h.runner.clone(),
        Options {
            concurrency_limit: 1,
            run_timeout: Some(Duration::from_millis(100)),
        },
    )
    .unwrap();
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    let results = orchestrator.run(&registry, shutdown_tx).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.outcome == Outcome::Failure));
}
