//! Configuration and secret resolution
//!
//! Entry points: [`get_config`] and [`get_secret`] for application code,
//! [`ConfigContext`] and the builders it hands out for everything that
//! needs an explicit environment (tests, tooling).

pub mod builder_base;
pub mod cache;
pub mod capabilities;
pub mod context;
pub mod database;
pub mod errors;
pub mod gcp;
pub mod masking;
pub mod parsing;
pub mod redis;
pub mod resolver;
pub mod secret_builder;
pub mod shared_secrets;
pub mod strategies;
pub mod unified_config;
pub mod unified_secrets;

mod env_provider;
mod environment;
mod isolated_env;
mod logging;
mod secret_config;
mod secret_info;

pub use builder_base::{ConfigBuilder, ConfigBuilderBase};
pub use cache::SecretCache;
pub use context::ConfigContext;
pub use env_provider::{EnvironmentProvider, SystemEnvironment};
pub use environment::{Environment, ENVIRONMENT_SIGNAL_VARS};
pub use errors::{ConfigError, RedisConfigError, SecretError};
pub use gcp::{GcpSecretManagerClient, SecretManagerClient};
pub use isolated_env::{IsolatedEnvironment, ScopedOverride};
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use secret_builder::SecretManagerBuilder;
pub use secret_config::{SecretRequest, SecretType, DEFAULT_MIN_SECRET_LENGTH};
pub use secret_info::{SecretInfo, SecretSource};
pub use shared_secrets::SharedSecretManager;
pub use unified_config::{
    config_manager, get_config, get_secret, AppConfig, ConfigurationValidationResult, LlmConfig, SecurityConfig,
    UnifiedConfigManager, WebSocketConfig,
};
pub use unified_secrets::{HealthStatus, SecretValidationReport, UnifiedSecretManager};
