use std::fmt;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::errors::RedisConfigError;
use crate::config::masking::mask_url_credentials;
use crate::config::parsing::parse_port;
use crate::config::{Environment, EnvironmentProvider};

use super::{RedisConfigurationBuilder, RedisConnectionInfo, DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT};

/// Variables holding a complete Redis URL, in lookup order
pub const REDIS_URL_VARS: &[&str] = &["REDIS_URL", "REDIS_CONNECTION_STRING", "REDIS_DSN"];

const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Components of a `redis://` or `rediss://` URL
#[derive(Clone, PartialEq, Eq)]
pub struct ParsedRedisUrl {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
}

impl fmt::Debug for ParsedRedisUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedRedisUrl")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .finish()
    }
}

fn decode_component(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Parse a Redis URL; credentials are percent-decoded
pub fn parse_redis_url(raw: &str) -> Result<ParsedRedisUrl, RedisConfigError> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| RedisConfigError::InvalidUrl(format!("{}: {}", mask_url_credentials(raw), e)))?;

    let tls = match url.scheme() {
        "redis" => false,
        "rediss" => true,
        other => {
            return Err(RedisConfigError::InvalidUrl(format!(
                "unsupported scheme '{}' (expected redis or rediss)",
                other
            )));
        }
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| RedisConfigError::InvalidUrl("URL has no host".to_string()))?
        .to_string();

    let db = match url.path().trim_start_matches('/') {
        "" => 0,
        path => path
            .parse::<i64>()
            .map_err(|_| RedisConfigError::InvalidUrl(format!("invalid database index '{}'", path)))?,
    };

    Ok(ParsedRedisUrl {
        host,
        port: url.port().unwrap_or(DEFAULT_REDIS_PORT),
        db,
        username: Some(url.username())
            .filter(|user| !user.is_empty())
            .map(decode_component),
        password: url.password().map(decode_component),
        tls,
    })
}

fn tcp_probe(host: &str, port: u16, timeout: Duration) -> Result<(), String> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve {}: {}", host, e))?
        .collect();

    let mut last_error = format!("{} resolved to no addresses", host);
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return Ok(()),
            Err(e) => last_error = format!("{}: {}", addr, e),
        }
    }
    Err(last_error)
}

/// Where to connect and with which credentials
pub struct ConnectionBuilder<'a> {
    builder: &'a RedisConfigurationBuilder,
}

impl<'a> ConnectionBuilder<'a> {
    pub(super) fn new(builder: &'a RedisConfigurationBuilder) -> Self {
        Self { builder }
    }

    /// First configured Redis URL and the variable it came from
    pub fn url_from_env(&self) -> Option<(String, String)> {
        self.builder.base.first_of(REDIS_URL_VARS)
    }

    fn port_from_env(&self) -> u16 {
        match self.builder.base.get_trimmed("REDIS_PORT") {
            None => DEFAULT_REDIS_PORT,
            Some(raw) => parse_port(&raw, "REDIS_PORT").unwrap_or_else(|e| {
                tracing::warn!("{}; using {}", e, DEFAULT_REDIS_PORT);
                DEFAULT_REDIS_PORT
            }),
        }
    }

    /// Build connection info from a URL if one parses, else from discrete variables
    pub fn build(&self) -> RedisConnectionInfo {
        let base = &self.builder.base;
        let ssl = self.builder.ssl();

        let parsed = self.url_from_env().and_then(|(key, raw)| {
            parse_redis_url(&raw)
                .inspect_err(|e| tracing::warn!("{} is malformed ({}); using REDIS_HOST/REDIS_PORT instead", key, e))
                .ok()
        });

        let (host, port, db, username, url_password, url_tls) = match parsed {
            Some(url) => (url.host, url.port, url.db, url.username, url.password, url.tls),
            None => (
                base.get_env_or("REDIS_HOST", DEFAULT_REDIS_HOST),
                self.port_from_env(),
                base.get_env_int("REDIS_DB", 0),
                base.get_trimmed("REDIS_USERNAME"),
                None,
                false,
            ),
        };

        let password = url_password
            .filter(|p| !p.is_empty())
            .or_else(|| self.builder.secrets.redis().get_password());

        let info = RedisConnectionInfo {
            host,
            port,
            db,
            username,
            password,
            ssl_enabled: url_tls || ssl.is_enabled(),
            ssl_cert_reqs: ssl.cert_reqs(),
            max_connections: self.builder.pool().max_connections(),
            socket_timeout: base.get_env_duration("REDIS_SOCKET_TIMEOUT", DEFAULT_SOCKET_TIMEOUT),
            socket_connect_timeout: base.get_env_duration("REDIS_SOCKET_CONNECT_TIMEOUT", DEFAULT_SOCKET_TIMEOUT),
            retry_on_timeout: base.get_env_bool("REDIS_RETRY_ON_TIMEOUT", true),
            decode_responses: base.get_env_bool("REDIS_DECODE_RESPONSES", true),
            health_check_interval: self.builder.monitoring().health_check_interval(),
        };

        tracing::debug!("Redis connection target for {}: {}", base.environment(), info.masked_url());
        info
    }

    /// Full connection URL, credentials included
    pub fn get_redis_url(&self) -> String {
        self.builder.connection_info().to_url()
    }

    /// Whether an unreachable target may be replaced by local Redis
    ///
    /// Only in development and testing, only when `REDIS_FALLBACK_ENABLED`
    /// allows it (default: on in development), and never when
    /// `REDIS_REQUIRED` is set.
    pub fn fallback_allowed(&self) -> bool {
        let base = &self.builder.base;
        let environment = base.environment();
        environment.is_local()
            && base.get_env_bool("REDIS_FALLBACK_ENABLED", environment == Environment::Development)
            && !base.get_env_bool("REDIS_REQUIRED", false)
    }

    /// TCP-connect to the configured target, returning the `host:port` that answered
    ///
    /// # Errors
    /// `RedisConfigError::Unreachable` when neither the target nor a
    /// permitted local fallback accepts a connection within `timeout`.
    pub fn verify_reachable(&self, timeout: Duration) -> Result<String, RedisConfigError> {
        let info = self.builder.connection_info();
        let target = info.target();

        let reason = match tcp_probe(&info.host, info.port, timeout) {
            Ok(()) => return Ok(target),
            Err(reason) => reason,
        };

        if !self.fallback_allowed() {
            tracing::error!("Redis at {} is unreachable and fallback is disabled: {}", target, reason);
            return Err(RedisConfigError::Unreachable { target, reason });
        }

        let fallback = format!("{}:{}", DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT);
        tracing::warn!("Redis at {} is unreachable ({}); falling back to {}", target, reason, fallback);
        tcp_probe(DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT, timeout)
            .map(|()| fallback.clone())
            .map_err(|reason| RedisConfigError::Unreachable { target: fallback, reason })
    }
}
