//! Run summary aggregation and rendering

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::models::report::{DeploymentResult, Outcome, OverallOutcome, RunSummary};
use crate::utils::format_duration_ms;

/// Derive the run summary from the collected per-target results.
/// An empty result set counts as all-succeeded.
pub fn aggregate(
    run_id: String,
    started_at: DateTime<Utc>,
    results: Vec<DeploymentResult>,
) -> RunSummary {
    let successes = results
        .iter()
        .filter(|r| r.outcome == Outcome::Success)
        .count();
    let overall_outcome = if successes == results.len() {
        OverallOutcome::AllSucceeded
    } else if successes == 0 {
        OverallOutcome::AllFailed
    } else {
        OverallOutcome::PartialFailure
    };

    RunSummary {
        run_id,
        started_at,
        results,
        overall_outcome,
    }
}

/// One line per target plus a totals line
pub fn render(summary: &RunSummary) -> String {
    let mut lines = vec![format!(
        "Deployment run {} ({})",
        summary.run_id,
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )];

    for result in &summary.results {
        let outcome = match result.outcome {
            Outcome::Success => "SUCCESS".green().to_string(),
            Outcome::Failure => "FAILURE".red().to_string(),
        };
        let phase = result
            .phase_reached
            .map(|p| p.as_str())
            .unwrap_or("-");
        let mut line = format!(
            "  {:<16} {}  phase={} ({})",
            result.target_label,
            outcome,
            phase,
            format_duration_ms(result.duration_ms)
        );
        if let Some(detail) = &result.error_detail {
            line.push_str(&format!(" - {}", detail));
        }
        lines.push(line);
    }

    let successes = summary
        .results
        .iter()
        .filter(|r| r.outcome == Outcome::Success)
        .count();
    let overall = match summary.overall_outcome {
        OverallOutcome::AllSucceeded => summary.overall_outcome.as_str().green().to_string(),
        _ => summary.overall_outcome.as_str().red().to_string(),
    };
    lines.push(format!(
        "{} of {} target(s) succeeded: {}",
        successes,
        summary.results.len(),
        overall
    ));

    lines.join("\n")
}

/// Zero only when every target succeeded
pub fn exit_code(summary: &RunSummary) -> i32 {
    match summary.overall_outcome {
        OverallOutcome::AllSucceeded => 0,
        OverallOutcome::PartialFailure | OverallOutcome::AllFailed => 1,
    }
}
