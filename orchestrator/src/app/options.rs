//! Application configuration options

use std::path::PathBuf;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Path to the settings file
    pub config_path: PathBuf,

    /// Path to the secrets file
    pub secrets_path: PathBuf,

    /// Override the configured concurrency limit
    pub concurrency_override: Option<usize>,

    /// Print the per-target plan without touching any host
    pub dry_run: bool,

    /// Emit the run summary as JSON
    pub json_summary: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/flotilla/config.json"),
            secrets_path: PathBuf::from("/etc/flotilla/secrets.json"),
            concurrency_override: None,
            dry_run: false,
            json_summary: false,
        }
    }
}
