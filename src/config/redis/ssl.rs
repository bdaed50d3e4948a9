use serde::Serialize;

use crate::config::builder_base::ConfigBuilderBase;
use crate::config::parsing::parse_bool;
use crate::config::{Environment, EnvironmentProvider};

const CERT_REQS: &[&str] = &["required", "optional", "none"];

/// TLS settings handed to the Redis client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SslConfig {
    pub cert_reqs: String,
    pub ca_certs: Option<String>,
    pub certfile: Option<String>,
    pub keyfile: Option<String>,
    pub check_hostname: bool,
}

/// SSL policy
///
/// `REDIS_SSL` wins when set, except that production only honours
/// `REDIS_SSL=false` together with `REDIS_ALLOW_INSECURE_PRODUCTION`.
/// Without an explicit value, staging and production require SSL and
/// development does not.
pub struct SslBuilder<'a> {
    base: &'a ConfigBuilderBase,
}

impl<'a> SslBuilder<'a> {
    pub(super) fn new(base: &'a ConfigBuilderBase) -> Self {
        Self { base }
    }

    fn explicit(&self) -> Option<bool> {
        let raw = self.base.get_trimmed("REDIS_SSL")?;
        parse_bool(&raw, "REDIS_SSL")
            .inspect_err(|e| tracing::warn!("{}; using the environment default", e))
            .ok()
    }

    /// Production is running without SSL because an operator said so
    pub fn insecure_production_override(&self) -> bool {
        self.base.is_production()
            && self.explicit() == Some(false)
            && self.base.get_env_bool("REDIS_ALLOW_INSECURE_PRODUCTION", false)
    }

    pub fn is_enabled(&self) -> bool {
        let explicit = self.explicit();
        match self.base.environment() {
            Environment::Production => {
                if explicit != Some(false) {
                    return true;
                }
                if self.insecure_production_override() {
                    tracing::warn!(
                        "REDIS_SSL=false accepted in production because REDIS_ALLOW_INSECURE_PRODUCTION is set"
                    );
                    false
                } else {
                    tracing::error!(
                        "REDIS_SSL=false is ignored in production; set REDIS_ALLOW_INSECURE_PRODUCTION to override"
                    );
                    true
                }
            }
            Environment::Staging => explicit.unwrap_or(true),
            Environment::Development | Environment::Testing => explicit.unwrap_or(false),
        }
    }

    pub fn cert_reqs(&self) -> String {
        self.base.get_env_or("REDIS_SSL_CERT_REQS", "required").to_lowercase()
    }

    /// Client TLS settings, `None` when SSL is off
    pub fn get_ssl_config(&self) -> Option<SslConfig> {
        if !self.is_enabled() {
            return None;
        }

        let cert_reqs = self.cert_reqs();
        Some(SslConfig {
            check_hostname: cert_reqs == "required",
            cert_reqs,
            ca_certs: self.base.get_trimmed("REDIS_SSL_CA_CERTS"),
            certfile: self.base.get_trimmed("REDIS_SSL_CERTFILE"),
            keyfile: self.base.get_trimmed("REDIS_SSL_KEYFILE"),
        })
    }

    pub fn validate(&self) -> (bool, String) {
        let Some(config) = self.get_ssl_config() else {
            return (true, "SSL disabled".to_string());
        };

        if !CERT_REQS.contains(&config.cert_reqs.as_str()) {
            return (
                false,
                format!(
                    "REDIS_SSL_CERT_REQS must be one of {}, got '{}'",
                    CERT_REQS.join(", "),
                    config.cert_reqs
                ),
            );
        }

        match (&config.certfile, &config.keyfile) {
            (Some(_), None) => (false, "REDIS_SSL_CERTFILE is set without REDIS_SSL_KEYFILE".to_string()),
            (None, Some(_)) => (false, "REDIS_SSL_KEYFILE is set without REDIS_SSL_CERTFILE".to_string()),
            _ => {
                if self.base.is_production() && config.cert_reqs == "none" {
                    tracing::warn!("Redis SSL in production does not verify server certificates");
                }
                (true, "SSL configuration valid".to_string())
            }
        }
    }
}
