//! Flotilla - Entry Point
//!
//! Deploys a web application to a fixed fleet of remote machines over SSH,
//! hands the process to the remote supervisor, and reports per-target
//! results with a single pass/fail exit status.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use flotilla::app::options::AppOptions;
use flotilla::app::run::run;
use flotilla::config::Settings;
use flotilla::deploy::script::describe_plan;
use flotilla::filesys::file::File;
use flotilla::logs::{init_logging, LogOptions};
use flotilla::report;
use flotilla::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    let mut options = AppOptions::default();
    if let Some(path) = cli_args.get("config") {
        options.config_path = PathBuf::from(path);
    }
    if let Some(path) = cli_args.get("secrets") {
        options.secrets_path = PathBuf::from(path);
    }
    if let Some(value) = cli_args.get("concurrency") {
        match value.parse::<usize>() {
            Ok(limit) => options.concurrency_override = Some(limit),
            Err(_) => {
                eprintln!("Invalid --concurrency value: {}", value);
                std::process::exit(2);
            }
        }
    }
    options.dry_run = cli_args.contains_key("dry-run");
    options.json_summary = cli_args.contains_key("json");

    // Retrieve the settings file
    let settings_file = File::new(&options.config_path);
    let settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read config file {}: {}",
                options.config_path.display(),
                e
            );
            std::process::exit(2);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Print the plan without touching any host
    if options.dry_run {
        for target in &settings.targets {
            println!("{}:", target.label);
            for line in describe_plan(target, &settings.commands) {
                println!("  {}", line);
            }
        }
        return;
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    info!("Starting deployment run {} (version {})", run_id, version.version);

    match run(run_id, settings, options.clone(), await_shutdown_signal()).await {
        Ok(summary) => {
            if options.json_summary {
                println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
            } else {
                println!("{}", report::render(&summary));
            }
            std::process::exit(report::exit_code(&summary));
        }
        Err(e) => {
            error!("Deployment run failed: {e}");
            std::process::exit(2);
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
