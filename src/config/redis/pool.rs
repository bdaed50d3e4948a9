use serde::Serialize;

use crate::config::builder_base::ConfigBuilderBase;
use crate::config::Environment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolConfig {
    pub pool_size: u32,
    pub max_connections: u32,
    pub retry_on_timeout: bool,
    pub socket_keepalive: bool,
}

/// Connection pool sizing, scaled by environment
pub struct PoolBuilder<'a> {
    base: &'a ConfigBuilderBase,
}

impl<'a> PoolBuilder<'a> {
    pub(super) fn new(base: &'a ConfigBuilderBase) -> Self {
        Self { base }
    }

    /// `(pool_size, max_connections)` defaults
    fn defaults(&self) -> (u32, u32) {
        match self.base.environment() {
            Environment::Development | Environment::Testing => (10, 20),
            Environment::Staging => (20, 30),
            Environment::Production => (50, 50),
        }
    }

    pub fn pool_size(&self) -> u32 {
        self.base.get_env_u32("REDIS_POOL_SIZE", self.defaults().0)
    }

    /// Never below the pool size
    pub fn max_connections(&self) -> u32 {
        let max = self.base.get_env_u32("REDIS_MAX_CONNECTIONS", self.defaults().1);
        max.max(self.pool_size())
    }

    pub fn get_pool_config(&self) -> PoolConfig {
        PoolConfig {
            pool_size: self.pool_size(),
            max_connections: self.max_connections(),
            retry_on_timeout: self.base.get_env_bool("REDIS_RETRY_ON_TIMEOUT", true),
            socket_keepalive: self.base.get_env_bool("REDIS_SOCKET_KEEPALIVE", true),
        }
    }
}
