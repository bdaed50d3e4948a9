//! Application-facing configuration facade
//!
//! [`UnifiedConfigManager`] composes the database, Redis and secret
//! builders into one [`AppConfig`]. The built value is memoized until
//! [`UnifiedConfigManager::reload`].

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::builder_base::{ConfigBuilder, ConfigBuilderBase};
use crate::config::capabilities::{SupportsConnectionStatus, SupportsPoolStatus};
use crate::config::context::ConfigContext;
use crate::config::database::DatabaseConfig;
use crate::config::errors::{ConfigError, SecretError};
use crate::config::masking::{log_config_summary, mask_secret, serialize_masked, serialize_masked_option};
use crate::config::redis::{RedisConnectionInfo, REDIS_URL_VARS};
use crate::config::{Environment, EnvironmentProvider, SecretRequest, SecretType};

pub const DEFAULT_JWT_ALGORITHM: &str = "HS256";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-pro";

/// Variable-name fragments that mark a value as sensitive for placeholder counting
const SENSITIVE_KEY_MARKERS: &[&str] = &["SECRET", "PASSWORD", "API_KEY", "TOKEN", "DATABASE_URL", "REDIS_URL"];

/// Values that are clearly template text rather than real settings
const PLACEHOLDER_VALUE_MARKERS: &[&str] = &["placeholder", "changeme", "change-me", "your-", "replace", "xxxx", "todo"];

static GLOBAL_MANAGER: OnceLock<UnifiedConfigManager> = OnceLock::new();

#[derive(Clone, Serialize)]
pub struct SecurityConfig {
    #[serde(serialize_with = "serialize_masked")]
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub access_token_expire_minutes: u32,
    #[serde(serialize_with = "serialize_masked")]
    pub session_secret: String,
    #[serde(serialize_with = "serialize_masked_option")]
    pub service_secret: Option<String>,
    pub service_id: String,
    pub oauth_client_id: Option<String>,
    #[serde(serialize_with = "serialize_masked_option")]
    pub oauth_client_secret: Option<String>,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &mask_secret(&self.jwt_secret))
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("session_secret", &mask_secret(&self.session_secret))
            .field("service_secret", &self.service_secret.as_deref().map(mask_secret))
            .field("service_id", &self.service_id)
            .field("oauth_client_id", &self.oauth_client_id)
            .field("oauth_client_secret", &self.oauth_client_secret.as_deref().map(mask_secret))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebSocketConfig {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub max_connections: u32,
    /// Bytes
    pub max_message_size: u32,
    pub timeout: Duration,
}

#[derive(Clone, Serialize)]
pub struct LlmConfig {
    #[serde(serialize_with = "serialize_masked_option")]
    pub anthropic_api_key: Option<String>,
    #[serde(serialize_with = "serialize_masked_option")]
    pub openai_api_key: Option<String>,
    #[serde(serialize_with = "serialize_masked_option")]
    pub gemini_api_key: Option<String>,
    pub default_model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn has_any_provider(&self) -> bool {
        self.anthropic_api_key.is_some() || self.openai_api_key.is_some() || self.gemini_api_key.is_some()
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("anthropic_api_key", &self.anthropic_api_key.as_deref().map(mask_secret))
            .field("openai_api_key", &self.openai_api_key.as_deref().map(mask_secret))
            .field("gemini_api_key", &self.gemini_api_key.as_deref().map(mask_secret))
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Resolved configuration consumed by the rest of the application
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub redis: RedisConnectionInfo,
    pub security: SecurityConfig,
    pub websocket: WebSocketConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigurationValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub placeholder_count: usize,
}

pub struct UnifiedConfigManager {
    context: Arc<ConfigContext>,
    config: RwLock<Option<Arc<AppConfig>>>,
}

impl UnifiedConfigManager {
    pub fn new(context: Arc<ConfigContext>) -> Self {
        Self {
            context,
            config: RwLock::new(None),
        }
    }

    pub fn context(&self) -> &Arc<ConfigContext> {
        &self.context
    }

    /// Build the configuration on first use, then serve the same instance
    ///
    /// # Errors
    /// Returns `ConfigError::Secret` when a required secret cannot be
    /// resolved for the current environment. Nothing is memoized on failure.
    pub fn get_config(&self) -> Result<Arc<AppConfig>, ConfigError> {
        if let Some(config) = self.config.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(config));
        }

        let built = Arc::new(self.build()?);
        let mut slot = self.config.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have finished first; keep its instance
        Ok(Arc::clone(slot.get_or_insert(built)))
    }

    /// Drop the memoized configuration and cached secrets, then rebuild
    pub fn reload(&self) -> Result<Arc<AppConfig>, ConfigError> {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.context.cache().clear();
        tracing::info!("Configuration reload requested for {}", self.context.environment());
        self.get_config()
    }

    pub fn get_database_config(&self) -> Result<DatabaseConfig, ConfigError> {
        Ok(self.get_config()?.database.clone())
    }

    pub fn get_redis_config(&self) -> Result<RedisConnectionInfo, ConfigError> {
        Ok(self.get_config()?.redis.clone())
    }

    pub fn get_security_config(&self) -> Result<SecurityConfig, ConfigError> {
        Ok(self.get_config()?.security.clone())
    }

    pub fn get_websocket_config(&self) -> Result<WebSocketConfig, ConfigError> {
        Ok(self.get_config()?.websocket.clone())
    }

    pub fn get_llm_config(&self) -> Result<LlmConfig, ConfigError> {
        Ok(self.get_config()?.llm.clone())
    }

    /// Resolve one required secret through the full strategy chain
    pub fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.context
            .secrets()
            .get_secret(&SecretRequest::new(name, SecretType::Generic))?
            .map(|info| info.into_value())
            .ok_or_else(|| SecretError::not_found(name, self.context.environment(), Vec::new()))
    }

    fn build(&self) -> Result<AppConfig, ConfigError> {
        let base = self.context.builder_base();
        let environment = base.environment();

        let database = self.context.database_builder().get_config();
        let redis = self.context.redis_builder().get_config_for_environment();
        let security = self.security_config(&base)?;
        let websocket = websocket_config(&base);
        let llm = self.llm_config(&base);

        let config = AppConfig {
            environment,
            database,
            redis,
            security,
            websocket,
            llm,
        };

        match serde_json::to_value(&config) {
            Ok(summary) => log_config_summary("application", &summary),
            Err(e) => tracing::debug!("Could not summarize configuration: {}", e),
        }

        Ok(config)
    }

    fn security_config(&self, base: &ConfigBuilderBase) -> Result<SecurityConfig, ConfigError> {
        let secrets = self.context.secret_builder();
        let auth = secrets.auth();
        let environment = base.environment();
        let suffix = environment.key_suffix();

        let client_id_key = format!("GOOGLE_OAUTH_CLIENT_ID_{}", suffix);
        let client_secret_key = format!("GOOGLE_OAUTH_CLIENT_SECRET_{}", suffix);

        Ok(SecurityConfig {
            jwt_secret: auth.get_jwt_secret()?,
            jwt_algorithm: base.get_env_or("JWT_ALGORITHM", DEFAULT_JWT_ALGORITHM),
            access_token_expire_minutes: base.get_env_u32("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", 15),
            session_secret: self.context.secrets().get_session_secret()?.into_value(),
            service_secret: auth.get_service_secret().ok(),
            service_id: base
                .first_of(&["SERVICE_ID", "K_SERVICE"])
                .map(|(_, value)| value)
                .unwrap_or_else(|| "netra-backend".to_string()),
            oauth_client_id: base
                .first_of(&[client_id_key.as_str(), "GOOGLE_CLIENT_ID"])
                .map(|(_, value)| value),
            oauth_client_secret: base
                .first_of(&[client_secret_key.as_str(), "GOOGLE_CLIENT_SECRET"])
                .map(|(_, value)| value),
        })
    }

    fn llm_config(&self, base: &ConfigBuilderBase) -> LlmConfig {
        let api_key = |name: &str, aliases: &[&str]| {
            let request = SecretRequest::new(name, SecretType::ApiKey)
                .min_length(1)
                .required(false)
                .env_keys(std::iter::once(name).chain(aliases.iter().copied()));
            self.context
                .secrets()
                .get_secret(&request)
                .ok()
                .flatten()
                .map(|info| info.into_value())
        };

        LlmConfig {
            anthropic_api_key: api_key("ANTHROPIC_API_KEY", &[]),
            openai_api_key: api_key("OPENAI_API_KEY", &[]),
            gemini_api_key: api_key("GEMINI_API_KEY", &["GOOGLE_API_KEY"]),
            default_model: base.get_env_or("LLM_DEFAULT_MODEL", DEFAULT_LLM_MODEL),
            timeout: base.get_env_duration("LLM_TIMEOUT", Duration::from_secs(60)),
            max_retries: base.get_env_u32("LLM_MAX_RETRIES", 3),
        }
    }

    /// Run every builder's validation and scan the environment for placeholder values
    pub fn validate_config(&self) -> ConfigurationValidationResult {
        let base = self.context.builder_base();
        let environment = base.environment();
        let mut result = ConfigurationValidationResult::default();

        let checks: [(&str, (bool, String)); 3] = [
            ("database", self.context.database_builder().validate()),
            ("redis", self.context.redis_builder().validate()),
            ("secrets", self.context.secret_builder().validate()),
        ];
        for (component, (ok, reason)) in checks {
            if !ok {
                result.errors.push(format!("{}: {}", component, reason));
            }
        }

        match self.context.secrets().get_session_secret() {
            Ok(info) if info.is_fallback() && environment.is_deployed() => result
                .warnings
                .push(format!("SECRET_KEY is using a fallback value ({}) in {}", info.source(), environment)),
            Ok(_) => {}
            Err(e) => result.errors.push(e.to_string()),
        }

        if let Some((key, _)) = base.first_of(REDIS_URL_VARS) {
            if let Err(reason) = base.validate_url_var(&key, &["redis", "rediss"]) {
                result.errors.push(reason);
            }
        }

        let mut placeholders: Vec<&String> = base
            .vars()
            .iter()
            .filter(|(key, value)| is_sensitive_key(key) && is_placeholder_value(value))
            .map(|(key, _)| key)
            .collect();
        placeholders.sort();
        result.placeholder_count = placeholders.len();
        for key in placeholders {
            let message = format!("{} appears to hold a placeholder value", key);
            if environment.is_production() {
                result.errors.push(message);
            } else {
                result.warnings.push(message);
            }
        }

        result.is_valid = result.errors.is_empty();
        if result.is_valid {
            tracing::info!(
                "Configuration valid for {} ({} warnings)",
                environment,
                result.warnings.len()
            );
        } else {
            tracing::error!(
                "Configuration invalid for {}: {}",
                environment,
                result.errors.join("; ")
            );
        }
        result
    }

    /// Masked snapshot of every component, suitable for logs and diagnostics
    pub fn get_debug_report(&self) -> Value {
        let database = self.context.database_builder();
        let redis = self.context.redis_builder();

        let pools: [&dyn SupportsPoolStatus; 2] = [&database, &redis];
        let connections: [&dyn SupportsConnectionStatus; 2] = [&database, &redis];

        json!({
            "environment": self.context.environment(),
            "database": database.get_debug_info(),
            "redis": redis.get_debug_info(),
            "secrets": self.context.secret_builder().get_debug_info(),
            "pools": pools.iter().map(|c| c.pool_status()).collect::<Vec<_>>(),
            "connections": connections.iter().map(|c| c.connection_status()).collect::<Vec<_>>(),
            "secret_strategies": self.context.secrets().strategy_names(),
            "cached_secrets": self.context.cache().len(),
        })
    }
}

impl fmt::Debug for UnifiedConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiedConfigManager")
            .field("context", &self.context)
            .field(
                "loaded",
                &self.config.read().unwrap_or_else(PoisonError::into_inner).is_some(),
            )
            .finish()
    }
}

fn websocket_config(base: &ConfigBuilderBase) -> WebSocketConfig {
    WebSocketConfig {
        ping_interval: base.get_env_duration("WEBSOCKET_PING_INTERVAL", Duration::from_secs(30)),
        ping_timeout: base.get_env_duration("WEBSOCKET_PING_TIMEOUT", Duration::from_secs(10)),
        max_connections: base.get_env_u32("WEBSOCKET_MAX_CONNECTIONS", 1000),
        max_message_size: base.get_env_u32("WEBSOCKET_MAX_MESSAGE_SIZE", 1024 * 1024),
        timeout: base.get_env_duration("WEBSOCKET_TIMEOUT", Duration::from_secs(300)),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let upper = key.to_uppercase();
    SENSITIVE_KEY_MARKERS.iter().any(|marker| upper.contains(marker))
}

fn is_placeholder_value(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    (lowered.starts_with('<') && lowered.ends_with('>'))
        || PLACEHOLDER_VALUE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Process-lifetime manager over [`ConfigContext::global`]
pub fn config_manager() -> &'static UnifiedConfigManager {
    GLOBAL_MANAGER.get_or_init(|| UnifiedConfigManager::new(ConfigContext::global()))
}

pub fn get_config() -> Result<Arc<AppConfig>, ConfigError> {
    config_manager().get_config()
}

pub fn get_secret(name: &str) -> Result<String, SecretError> {
    config_manager().get_secret(name)
}
