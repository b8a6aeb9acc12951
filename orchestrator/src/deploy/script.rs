//! Remote deployment step planning
//!
//! The build-side of the pipeline is an explicit ordered list of named
//! steps rather than one opaque shell script, so each step can carry a
//! typed outcome and credit a phase.

use serde::{Deserialize, Serialize};

use crate::models::report::Phase;
use crate::models::target::Target;
use crate::transport::Script;

/// Commands run inside the remote working directory, overridable per registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSet {
    /// Dependency install from the lock-file-pinned manifest
    #[serde(default = "default_install_command")]
    pub install: String,

    /// Build command
    #[serde(default = "default_build_command")]
    pub build: String,

    /// Command handed to the process supervisor
    #[serde(default = "default_start_command")]
    pub start: String,
}

fn default_install_command() -> String {
    "npm ci".to_string()
}

fn default_build_command() -> String {
    "npm run build".to_string()
}

fn default_start_command() -> String {
    "npm start".to_string()
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            install: default_install_command(),
            build: default_build_command(),
            start: default_start_command(),
        }
    }
}

/// One named remote step
#[derive(Debug, Clone)]
pub struct ScriptStep {
    /// Short name used in error details and the dry-run plan
    pub name: &'static str,

    /// Command sequence run in one shell session
    pub script: Script,

    /// Phase credited once this step completes
    pub completes: Option<Phase>,
}

/// Ordered build-side steps for a target, run after the artifact copy and
/// before the supervisor handoff. Every step is safe to re-run after a
/// partial prior failure.
pub fn build_steps(target: &Target, commands: &CommandSet) -> Vec<ScriptStep> {
    let workdir = &target.artifact_path;
    vec![
        ScriptStep {
            name: "select-workdir",
            script: Script::single(format!("mkdir -p {}", workdir)),
            completes: None,
        },
        ScriptStep {
            name: "install-dependencies",
            script: Script::new()
                .then(format!("cd {}", workdir))
                .then(commands.install.clone()),
            completes: Some(Phase::DependenciesInstalled),
        },
        ScriptStep {
            name: "build",
            script: Script::new()
                .then(format!("cd {}", workdir))
                .then(commands.build.clone()),
            completes: Some(Phase::Built),
        },
    ]
}

/// Human-readable plan for one target, used by dry runs
pub fn describe_plan(target: &Target, commands: &CommandSet) -> Vec<String> {
    let mut plan = vec![format!(
        "[copy-artifact] replace {}:{} with the local artifact",
        target.host, target.artifact_path
    )];
    for step in build_steps(target, commands) {
        plan.push(format!("[{}] {}", step.name, step.script.render()));
    }
    plan.push(format!(
        "[stop-process] stop {} (ok if absent)",
        target.process_name
    ));
    plan.push(format!(
        "[delete-process] delete {} (ok if absent)",
        target.process_name
    ));
    plan.push(format!(
        "[start-process] start \"{}\" as {} on 0.0.0.0:{}",
        commands.start, target.process_name, target.service_port
    ));
    plan.push("[persist-state] save the supervisor process list".to_string());
    plan.push("[enable-autostart] register supervisor boot autostart".to_string());
    plan.push(format!(
        "[verify-running] poll until {} is online",
        target.process_name
    ));
    plan.push(format!(
        "[health-check] probe http://{}:{}/",
        target.host, target.service_port
    ));
    plan
}
