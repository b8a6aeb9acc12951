//! Logging configuration

use std::path::PathBuf;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::OrchestratorError;

/// Log level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Directory for daily-rolling file output, stdout-only when absent
    pub log_dir: Option<PathBuf>,

    /// Enable JSON format
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_format: false,
        }
    }
}

/// Initialize logging
pub fn init_logging(options: LogOptions) -> Result<(), OrchestratorError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let subscriber = tracing_subscriber::registry().with(filter);

    match options.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "flotilla.log");
            if options.json_format {
                subscriber
                    .with(fmt::layer().json())
                    .with(fmt::layer().json().with_ansi(false).with_writer(file_appender))
                    .try_init()
                    .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;
            } else {
                subscriber
                    .with(fmt::layer())
                    .with(fmt::layer().with_ansi(false).with_writer(file_appender))
                    .try_init()
                    .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;
            }
        }
        None => {
            if options.json_format {
                subscriber
                    .with(fmt::layer().json())
                    .try_init()
                    .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;
            } else {
                subscriber
                    .with(fmt::layer())
                    .try_init()
                    .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;
            }
        }
    }

    Ok(())
}
