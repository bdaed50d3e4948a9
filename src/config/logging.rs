use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::EnvironmentProvider;

/// Logging settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `netra_config=debug,warn`
    pub log_level: String,
    pub app_log_file: Option<PathBuf>,
    pub app_log_retention_days: usize,
}

impl LoggingConfig {
    pub fn from_env(env: &dyn EnvironmentProvider) -> Self {
        Self {
            log_level: env.get_trimmed("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            app_log_file: env.get_trimmed("APP_LOG_FILE").map(PathBuf::from),
            app_log_retention_days: env
                .get_trimmed("APP_LOG_RETENTION_DAYS")
                .and_then(|v| v.parse().ok())
                .filter(|days| *days > 0)
                .unwrap_or(7),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("File system error: {0}")]
    FileSystemError(#[from] std::io::Error),
}

fn file_appender(path: &Path, retention_days: usize) -> Result<RollingFileAppender, LoggingError> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoggingError::InitializationError(format!("Invalid log file path: {}", path.display())))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(retention_days)
        .build(directory)
        .map_err(|e| LoggingError::InitializationError(e.to_string()))
}

/// Install the global subscriber: console output on stderr, plus a daily
/// rotated file when `APP_LOG_FILE` is set
///
/// stdout is left to command output such as JSON reports.
pub fn init_logging(env: &dyn EnvironmentProvider) -> Result<(), LoggingError> {
    let config = LoggingConfig::from_env(env);

    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| LoggingError::InvalidLogLevel(format!("{}: {}", config.log_level, e)))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter.clone());

    let subscriber = tracing_subscriber::registry().with(console_layer);

    match &config.app_log_file {
        Some(path) => {
            let file_layer = fmt::layer()
                .with_writer(file_appender(path, config.app_log_retention_days)?)
                .with_target(true)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter);

            subscriber
                .with(file_layer)
                .try_init()
                .map_err(|e| LoggingError::InitializationError(e.to_string()))
        }
        None => subscriber
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::from_env(&vars(&[]));

        assert_eq!(config.log_level, "info");
        assert_eq!(config.app_log_file, None);
        assert_eq!(config.app_log_retention_days, 7);
    }

    #[test]
    fn test_from_env() {
        let config = LoggingConfig::from_env(&vars(&[
            ("LOG_LEVEL", "netra_config=debug"),
            ("APP_LOG_FILE", "/var/log/netra/config.log"),
            ("APP_LOG_RETENTION_DAYS", "0"),
        ]));

        assert_eq!(config.log_level, "netra_config=debug");
        assert_eq!(config.app_log_file, Some(PathBuf::from("/var/log/netra/config.log")));
        assert_eq!(config.app_log_retention_days, 7);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let result = init_logging(&vars(&[("LOG_LEVEL", "netra_config=loud")]));
        assert!(matches!(result, Err(LoggingError::InvalidLogLevel(_))));
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("config.log");

        file_appender(&path, 3).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
