use std::time::Duration;

use serde::Serialize;

use crate::config::builder_base::ConfigBuilderBase;
use crate::config::Environment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub slow_query_threshold: Duration,
    pub log_slow_queries: bool,
}

/// Health checks and slow-query reporting
pub struct MonitoringBuilder<'a> {
    base: &'a ConfigBuilderBase,
}

impl<'a> MonitoringBuilder<'a> {
    pub(super) fn new(base: &'a ConfigBuilderBase) -> Self {
        Self { base }
    }

    pub fn health_check_interval(&self) -> Duration {
        let default = match self.base.environment() {
            Environment::Production => Duration::from_secs(15),
            Environment::Staging => Duration::from_secs(30),
            Environment::Development | Environment::Testing => Duration::from_secs(60),
        };
        self.base.get_env_duration("REDIS_HEALTH_CHECK_INTERVAL", default)
    }

    pub fn get_monitoring_config(&self) -> MonitoringConfig {
        MonitoringConfig {
            enabled: self.base.get_env_bool("REDIS_MONITORING_ENABLED", self.base.environment().is_deployed()),
            health_check_interval: self.health_check_interval(),
            health_check_timeout: self
                .base
                .get_env_duration("REDIS_HEALTH_CHECK_TIMEOUT", Duration::from_secs(5)),
            slow_query_threshold: self
                .base
                .get_env_duration("REDIS_SLOW_QUERY_THRESHOLD", Duration::from_millis(100)),
            log_slow_queries: self.base.get_env_bool("REDIS_LOG_SLOW_QUERIES", true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitoring(vars: &[(&str, &str)]) -> MonitoringConfig {
        let base = ConfigBuilderBase::from_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        MonitoringBuilder::new(&base).get_monitoring_config()
    }

    #[test]
    fn test_defaults_by_environment() {
        let dev = monitoring(&[("ENVIRONMENT", "development")]);
        assert!(!dev.enabled);
        assert_eq!(dev.health_check_interval, Duration::from_secs(60));

        let prod = monitoring(&[("ENVIRONMENT", "production")]);
        assert!(prod.enabled);
        assert_eq!(prod.health_check_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_human_readable_durations() {
        let config = monitoring(&[
            ("ENVIRONMENT", "staging"),
            ("REDIS_HEALTH_CHECK_INTERVAL", "2m"),
            ("REDIS_SLOW_QUERY_THRESHOLD", "250ms"),
        ]);

        assert_eq!(config.health_check_interval, Duration::from_secs(120));
        assert_eq!(config.slow_query_threshold, Duration::from_millis(250));
    }
}
