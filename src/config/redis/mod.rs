//! Redis connection configuration
//!
//! [`RedisConfigurationBuilder`] groups its settings into capability
//! sub-builders (`connection`, `pool`, `ssl`, `cluster`, `monitoring`) and
//! per-environment overlays. Secrets come from the embedded
//! [`SecretManagerBuilder`].

mod cluster;
mod connection;
mod monitoring;
mod overlays;
mod pool;
mod ssl;

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::builder_base::{ConfigBuilder, ConfigBuilderBase};
use crate::config::capabilities::{ConnectionStatus, PoolStatus, SupportsConnectionStatus, SupportsPoolStatus};
use crate::config::masking::mask_url_credentials;
use crate::config::secret_builder::SecretManagerBuilder;
use crate::config::shared_secrets::{SharedSecretManager, STAGING_MIN_PASSWORD_LENGTH};
use crate::config::Environment;

pub use cluster::{parse_cluster_nodes, ClusterBuilder, ClusterConfig, ClusterNode};
pub use connection::{parse_redis_url, ConnectionBuilder, ParsedRedisUrl, REDIS_URL_VARS};
pub use monitoring::{MonitoringBuilder, MonitoringConfig};
pub use overlays::EnvironmentOverlay;
pub use pool::{PoolBuilder, PoolConfig};
pub use ssl::{SslBuilder, SslConfig};

pub const DEFAULT_REDIS_HOST: &str = "localhost";
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Everything a Redis client needs to connect
///
/// `password` is skipped when serialized and masked in `Debug`.
#[derive(Clone, Serialize)]
pub struct RedisConnectionInfo {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    pub ssl_enabled: bool,
    pub ssl_cert_reqs: String,
    pub max_connections: u32,
    pub socket_timeout: Duration,
    pub socket_connect_timeout: Duration,
    pub retry_on_timeout: bool,
    pub decode_responses: bool,
    pub health_check_interval: Duration,
}

impl RedisConnectionInfo {
    /// `host:port`
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL including percent-encoded credentials
    pub fn to_url(&self) -> String {
        let scheme = if self.ssl_enabled { "rediss" } else { "redis" };
        let raw = format!("{}://{}:{}/{}", scheme, self.host, self.port, self.db);
        let Ok(mut url) = url::Url::parse(&raw) else {
            return raw;
        };
        // Both setters only fail for URLs without a host, ruled out by the parse above
        if let Some(username) = &self.username {
            let _ = url.set_username(username);
        }
        if let Some(password) = &self.password {
            let _ = url.set_password(Some(password));
        }
        url.to_string()
    }

    /// Connection URL safe to log
    pub fn masked_url(&self) -> String {
        mask_url_credentials(&self.to_url())
    }

    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

impl fmt::Debug for RedisConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_enabled", &self.ssl_enabled)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

pub(crate) fn is_localhost(host: &str) -> bool {
    matches!(
        host.trim().to_lowercase().as_str(),
        "localhost" | "127.0.0.1" | "::1" | "0.0.0.0"
    )
}

pub struct RedisConfigurationBuilder {
    base: ConfigBuilderBase,
    secrets: SecretManagerBuilder,
    connection_info: OnceLock<RedisConnectionInfo>,
}

impl RedisConfigurationBuilder {
    pub fn new(base: ConfigBuilderBase, shared: Option<Arc<SharedSecretManager>>) -> Self {
        let secrets = SecretManagerBuilder::new(base.clone(), shared);
        Self {
            base,
            secrets,
            connection_info: OnceLock::new(),
        }
    }

    pub fn secrets(&self) -> &SecretManagerBuilder {
        &self.secrets
    }

    pub fn connection(&self) -> ConnectionBuilder<'_> {
        ConnectionBuilder::new(self)
    }

    pub fn pool(&self) -> PoolBuilder<'_> {
        PoolBuilder::new(&self.base)
    }

    pub fn ssl(&self) -> SslBuilder<'_> {
        SslBuilder::new(&self.base)
    }

    pub fn cluster(&self) -> ClusterBuilder<'_> {
        ClusterBuilder::new(&self.base)
    }

    pub fn monitoring(&self) -> MonitoringBuilder<'_> {
        MonitoringBuilder::new(&self.base)
    }

    pub fn development(&self) -> EnvironmentOverlay<'_> {
        EnvironmentOverlay::new(self, Environment::Development)
    }

    pub fn staging(&self) -> EnvironmentOverlay<'_> {
        EnvironmentOverlay::new(self, Environment::Staging)
    }

    pub fn production(&self) -> EnvironmentOverlay<'_> {
        EnvironmentOverlay::new(self, Environment::Production)
    }

    /// Connection info built on first access and reused for this builder's lifetime
    pub fn connection_info(&self) -> &RedisConnectionInfo {
        self.connection_info.get_or_init(|| self.connection().build())
    }

    /// Client configuration tuned for the detected environment
    pub fn get_config_for_environment(&self) -> RedisConnectionInfo {
        match self.base.environment() {
            Environment::Production => self.production().get_config(),
            Environment::Staging => self.staging().get_config(),
            Environment::Development | Environment::Testing => self.development().get_config(),
        }
    }

    fn validation_errors(&self, info: &RedisConnectionInfo) -> Vec<String> {
        let environment = self.base.environment();
        let mut errors = Vec::new();

        if info.host.trim().is_empty() {
            errors.push("Redis host is empty".to_string());
        }
        if info.port == 0 {
            errors.push("Redis port must be between 1 and 65535".to_string());
        }
        if info.db < 0 {
            errors.push(format!("Redis db index must be >= 0, got {}", info.db));
        }

        if environment.is_deployed() {
            if is_localhost(&info.host) && !self.base.get_env_bool("ALLOW_LOCALHOST_REDIS", false) {
                errors.push(format!(
                    "Redis host '{}' is not allowed in {} (set ALLOW_LOCALHOST_REDIS to override)",
                    info.host, environment
                ));
            }

            match info.password.as_deref().map(|p| p.chars().count()).unwrap_or(0) {
                0 => errors.push(format!("REDIS_PASSWORD is required in {}", environment)),
                len if len < STAGING_MIN_PASSWORD_LENGTH => errors.push(format!(
                    "REDIS_PASSWORD must be at least {} characters in {} (got {})",
                    STAGING_MIN_PASSWORD_LENGTH, environment, len
                )),
                _ => {
                    let password = info.password.as_deref().unwrap_or_default();
                    let (ok, reason) =
                        SharedSecretManager::validate_password_strength("REDIS_PASSWORD", password, environment);
                    if !ok {
                        errors.push(reason);
                    }
                }
            }
        }

        if environment.is_production() && !info.ssl_enabled {
            if self.ssl().insecure_production_override() {
                tracing::warn!(
                    "Redis SSL is disabled in production by REDIS_ALLOW_INSECURE_PRODUCTION; traffic to {} is unencrypted",
                    info.host
                );
            } else {
                errors.push("Redis SSL must be enabled in production".to_string());
            }
        }

        let (ssl_ok, ssl_reason) = self.ssl().validate();
        if !ssl_ok {
            errors.push(ssl_reason);
        }

        errors
    }

    /// Validate an explicit connection info against this builder's environment policy
    pub fn validate_connection_info(&self, info: &RedisConnectionInfo) -> (bool, String) {
        let errors = self.validation_errors(info);
        if errors.is_empty() {
            (true, format!("Redis configuration valid for {}", self.base.environment()))
        } else {
            tracing::warn!("Redis configuration invalid: {}", errors.join("; "));
            (false, errors.join("; "))
        }
    }
}

impl ConfigBuilder for RedisConfigurationBuilder {
    fn base(&self) -> &ConfigBuilderBase {
        &self.base
    }

    fn validate(&self) -> (bool, String) {
        self.validate_connection_info(self.connection_info())
    }

    fn get_debug_info(&self) -> Value {
        let info = self.connection_info();
        json!({
            "environment": self.base.environment(),
            "connection": {
                "url": info.masked_url(),
                "host": info.host,
                "port": info.port,
                "db": info.db,
                "username": info.username,
                "password_set": info.has_password(),
                "ssl_enabled": info.ssl_enabled,
            },
            "pool": self.pool().get_pool_config(),
            "ssl": self.ssl().get_ssl_config(),
            "cluster": self.cluster().get_cluster_config(),
            "monitoring": self.monitoring().get_monitoring_config(),
            "insecure_production_override": self.ssl().insecure_production_override(),
        })
    }
}

impl SupportsPoolStatus for RedisConfigurationBuilder {
    fn pool_status(&self) -> PoolStatus {
        let pool = self.pool().get_pool_config();
        PoolStatus {
            component: "redis",
            pool_size: pool.pool_size,
            max_connections: pool.max_connections,
            timeout_secs: self.connection_info().socket_connect_timeout.as_secs(),
        }
    }
}

impl SupportsConnectionStatus for RedisConfigurationBuilder {
    fn connection_status(&self) -> ConnectionStatus {
        let info = self.connection_info();
        ConnectionStatus {
            component: "redis",
            target: info.masked_url(),
            configured: !info.host.trim().is_empty(),
            tls_enabled: info.ssl_enabled,
        }
    }
}

impl fmt::Debug for RedisConfigurationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfigurationBuilder")
            .field("environment", &self.base.environment())
            .field("connection_info", &self.connection_info.get())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn builder(vars: &[(&str, &str)]) -> RedisConfigurationBuilder {
        RedisConfigurationBuilder::new(
            ConfigBuilderBase::from_vars(
                vars.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::builder;
    use super::*;

    const STRONG: &str = "Xk9#mQ2$vL7@nP4!wR8";

    #[test]
    fn test_connection_info_is_memoized() {
        let redis = builder(&[("ENVIRONMENT", "development")]);
        let first: *const RedisConnectionInfo = redis.connection_info();
        let second: *const RedisConnectionInfo = redis.connection_info();
        assert_eq!(first, second);
    }

    #[test]
    fn test_development_defaults_are_valid() {
        let redis = builder(&[("ENVIRONMENT", "development")]);
        let info = redis.connection_info();

        assert_eq!(info.host, "localhost");
        assert_eq!(info.port, 6379);
        assert!(!info.ssl_enabled);
        assert!(redis.validate().0);
    }

    #[test]
    fn test_production_requires_hardening() {
        let localhost = builder(&[("ENVIRONMENT", "production"), ("REDIS_PASSWORD", STRONG)]);
        assert!(!localhost.validate().0);

        let no_password = builder(&[("ENVIRONMENT", "production"), ("REDIS_HOST", "redis.internal")]);
        let (ok, reason) = no_password.validate();
        assert!(!ok);
        assert!(reason.contains("REDIS_PASSWORD is required"));

        let short_password = builder(&[
            ("ENVIRONMENT", "production"),
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PASSWORD", "Xk9#mQ2$vL7@"),
        ]);
        assert!(!short_password.validate().0);

        let hardened = builder(&[
            ("ENVIRONMENT", "production"),
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PASSWORD", STRONG),
        ]);
        assert!(hardened.connection_info().ssl_enabled);
        assert!(hardened.validate().0, "{}", hardened.validate().1);
    }

    #[test]
    fn test_password_length_counts_characters() {
        let redis = builder(&[
            ("ENVIRONMENT", "staging"),
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PASSWORD", "ñññññ"),
        ]);

        let (ok, reason) = redis.validate();
        assert!(!ok);
        assert!(reason.contains("(got 5)"), "{}", reason);
    }

    #[test]
    fn test_production_rejects_disabled_ssl() {
        let redis = builder(&[
            ("ENVIRONMENT", "production"),
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PASSWORD", STRONG),
        ]);
        let mut info = redis.connection_info().clone();
        info.ssl_enabled = false;

        let (ok, reason) = redis.validate_connection_info(&info);
        assert!(!ok);
        assert!(reason.contains("SSL"));
    }

    #[test]
    fn test_production_ignores_ssl_false_without_escape_hatch() {
        let redis = builder(&[
            ("ENVIRONMENT", "production"),
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PASSWORD", STRONG),
            ("REDIS_SSL", "false"),
        ]);
        assert!(redis.connection_info().ssl_enabled);
    }

    #[test]
    fn test_production_escape_hatch_disables_ssl() {
        let redis = builder(&[
            ("ENVIRONMENT", "production"),
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PASSWORD", STRONG),
            ("REDIS_SSL", "false"),
            ("REDIS_ALLOW_INSECURE_PRODUCTION", "true"),
        ]);

        assert!(!redis.connection_info().ssl_enabled);
        assert!(redis.validate().0);
        assert_eq!(redis.get_debug_info()["insecure_production_override"], true);
    }

    #[test]
    fn test_staging_localhost_escape_hatch() {
        let base = [("ENVIRONMENT", "staging"), ("REDIS_PASSWORD", "Xk9#mQ2$vL")];
        assert!(!builder(&base).validate().0);

        let mut allowed = base.to_vec();
        allowed.push(("ALLOW_LOCALHOST_REDIS", "true"));
        assert!(builder(&allowed).validate().0);
    }

    #[test]
    fn test_staging_password_minimum() {
        let redis = builder(&[
            ("ENVIRONMENT", "staging"),
            ("REDIS_HOST", "redis.staging.internal"),
            ("REDIS_PASSWORD", "short"),
        ]);
        let (ok, reason) = redis.validate();
        assert!(!ok);
        assert!(reason.contains("at least 8"));
    }

    #[test]
    fn test_debug_info_masks_password() {
        let redis = builder(&[("ENVIRONMENT", "development"), ("REDIS_PASSWORD", STRONG)]);
        let info = redis.get_debug_info();

        assert!(!info.to_string().contains(STRONG));
        assert_eq!(info["connection"]["password_set"], true);
        assert!(!format!("{:?}", redis.connection_info()).contains(STRONG));
    }

    #[test]
    fn test_capability_reports() {
        let redis = builder(&[("ENVIRONMENT", "staging"), ("REDIS_HOST", "cache"), ("REDIS_PASSWORD", STRONG)]);

        let pool: &dyn SupportsPoolStatus = &redis;
        assert_eq!(pool.pool_status().pool_size, 20);

        let connection: &dyn SupportsConnectionStatus = &redis;
        let status = connection.connection_status();
        assert!(status.tls_enabled);
        assert!(!status.target.contains(STRONG));
    }

    #[test]
    fn test_config_for_environment_dispatch() {
        let prod = builder(&[("ENVIRONMENT", "production"), ("REDIS_HOST", "cache")]);
        assert!(prod.get_config_for_environment().ssl_enabled);
        assert_eq!(prod.get_config_for_environment().max_connections, 50);

        let dev = builder(&[("ENVIRONMENT", "development")]);
        assert!(!dev.get_config_for_environment().ssl_enabled);
    }
}
