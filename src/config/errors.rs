use thiserror::Error;

use crate::config::Environment;

/// Errors raised while resolving secrets
///
/// Only the fail-fast boundaries return these: `UnifiedSecretManager::get_secret`
/// with `required` set, and the JWT/service secret getters. Everything else
/// reports problems through validation results instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// No strategy produced a usable value
    #[error(
        "Required secret '{name}' could not be resolved in {environment} environment. Attempted strategies: {}",
        .attempted.join(", ")
    )]
    NotFound {
        name: String,
        environment: Environment,
        attempted: Vec<String>,
    },

    #[error("JWT secret is not available")]
    JwtSecretUnavailable,

    #[error("Service secret is not available")]
    ServiceSecretUnavailable,

    #[error("Secret '{name}' must be at least {expected} characters, got {actual}")]
    InvalidLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The Secret Manager HTTP client could not be constructed
    #[error("Secret Manager client error: {0}")]
    Client(String),
}

impl SecretError {
    pub fn not_found(name: &str, environment: Environment, attempted: Vec<String>) -> Self {
        Self::NotFound {
            name: name.to_string(),
            environment,
            attempted,
        }
    }

    pub fn invalid_length(name: &str, expected: usize, actual: usize) -> Self {
        Self::InvalidLength {
            name: name.to_string(),
            expected,
            actual,
        }
    }
}

/// Errors raised by Redis configuration when a connection target is required
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedisConfigError {
    #[error("Redis at {target} is unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("Invalid Redis URL: {0}")]
    InvalidUrl(String),
}

/// Top-level configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Redis(#[from] RedisConfigError),

    #[error("Invalid setting '{setting_name}': {reason}")]
    InvalidSetting { setting_name: String, reason: String },

    #[error("Failed to parse setting '{setting_name}': {error}")]
    Parse { setting_name: String, error: String },

    #[error("Configuration validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid_setting(setting_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            setting_name: setting_name.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(setting_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Parse {
            setting_name: setting_name.into(),
            error: error.into(),
        }
    }
}
