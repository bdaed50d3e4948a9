use std::time::Duration;

use crate::config::{Environment, EnvironmentProvider};

use super::{RedisConfigurationBuilder, RedisConnectionInfo};

/// Environment-tuned client settings layered over the base connection info
///
/// Tuned values only apply where the operator has not set the matching
/// variable explicitly.
pub struct EnvironmentOverlay<'a> {
    builder: &'a RedisConfigurationBuilder,
    target: Environment,
}

struct Tuning {
    socket_timeout: Duration,
    min_connections: u32,
    force_ssl: bool,
}

impl<'a> EnvironmentOverlay<'a> {
    pub(super) fn new(builder: &'a RedisConfigurationBuilder, target: Environment) -> Self {
        Self { builder, target }
    }

    fn tuning(&self) -> Tuning {
        match self.target {
            Environment::Production => Tuning {
                socket_timeout: Duration::from_secs(3),
                min_connections: 50,
                force_ssl: true,
            },
            Environment::Staging => Tuning {
                socket_timeout: Duration::from_secs(5),
                min_connections: 20,
                force_ssl: false,
            },
            Environment::Development | Environment::Testing => Tuning {
                socket_timeout: Duration::from_secs(10),
                min_connections: 0,
                force_ssl: false,
            },
        }
    }

    pub fn get_config(&self) -> RedisConnectionInfo {
        let base = &self.builder.base;
        let tuning = self.tuning();
        let mut config = self.builder.connection_info().clone();

        if base.get_trimmed("REDIS_SOCKET_TIMEOUT").is_none() {
            config.socket_timeout = tuning.socket_timeout;
        }
        if base.get_trimmed("REDIS_SOCKET_CONNECT_TIMEOUT").is_none() {
            config.socket_connect_timeout = tuning.socket_timeout;
        }
        config.max_connections = config.max_connections.max(tuning.min_connections);

        if tuning.force_ssl && !config.ssl_enabled && !self.builder.ssl().insecure_production_override() {
            tracing::warn!("Production overlay enabling SSL for Redis at {}", config.host);
            config.ssl_enabled = true;
        }

        config
    }
}
