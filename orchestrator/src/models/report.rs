//! Per-target and per-run result models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment phase a target reached
///
/// `ProcessStarted` is credited once the supervisor has accepted the start
/// sequence; `HealthChecked` is credited when the liveness probe was issued,
/// with the probe verdict carried by the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Copied,
    DependenciesInstalled,
    Built,
    ProcessStarted,
    HealthChecked,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Copied => "copied",
            Phase::DependenciesInstalled => "dependencies_installed",
            Phase::Built => "built",
            Phase::ProcessStarted => "process_started",
            Phase::HealthChecked => "health_checked",
        }
    }
}

/// Outcome of a single target's deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// Result of one target's pipeline, written exactly once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Label of the target this result belongs to
    pub target_label: String,

    /// Deepest phase reached, `None` when the target failed before any
    /// phase completed
    pub phase_reached: Option<Phase>,

    /// Whether the full pipeline succeeded
    pub outcome: Outcome,

    /// Failure detail, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Wall-clock time spent on this target
    pub duration_ms: u64,
}

/// Aggregate outcome across all targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallOutcome {
    AllSucceeded,
    PartialFailure,
    AllFailed,
}

impl OverallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallOutcome::AllSucceeded => "all_succeeded",
            OverallOutcome::PartialFailure => "partial_failure",
            OverallOutcome::AllFailed => "all_failed",
        }
    }
}

/// Summary of one deployment run, derived after all targets finish
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique identifier for this run
    pub run_id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Per-target results in original registry order
    pub results: Vec<DeploymentResult>,

    /// Aggregate outcome
    pub overall_outcome: OverallOutcome,
}
