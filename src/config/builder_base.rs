use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::config::parsing::{parse_bool, parse_duration_human, parse_integer, validate_url_scheme};
use crate::config::{Environment, EnvironmentProvider, IsolatedEnvironment};

/// Shared state for every configuration builder
///
/// Holds a frozen snapshot of the environment (optionally patched with
/// explicit overrides) and the environment detected from that snapshot.
/// Builders compose this rather than reading the live environment, so one
/// builder always sees one consistent view.
#[derive(Clone)]
pub struct ConfigBuilderBase {
    vars: HashMap<String, String>,
    environment: Environment,
}

impl ConfigBuilderBase {
    /// Snapshot the given environment store
    pub fn new(env: &IsolatedEnvironment) -> Self {
        Self::from_vars(env.get_all())
    }

    /// Snapshot `env` and apply `overrides` on top
    ///
    /// An override of `None` removes the key from the snapshot, which is how
    /// callers simulate an unset variable.
    pub fn with_overrides(env: &IsolatedEnvironment, overrides: &HashMap<String, Option<String>>) -> Self {
        let mut vars = env.get_all();
        for (key, value) in overrides {
            match value {
                Some(value) => {
                    vars.insert(key.clone(), value.clone());
                }
                None => {
                    vars.remove(key);
                }
            }
        }
        Self::from_vars(vars)
    }

    /// Build directly from a mapping
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let environment = Environment::detect(&vars);
        Self { vars, environment }
    }

    /// Same snapshot, with the environment pinned instead of detected
    pub fn for_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn is_development(&self) -> bool {
        self.environment.is_local()
    }

    pub fn is_staging(&self) -> bool {
        self.environment.is_staging()
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Raw value, `None` if absent
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Trimmed non-empty value, falling back to `default`
    pub fn get_env_or(&self, key: &str, default: &str) -> String {
        self.get_trimmed(key).unwrap_or_else(|| default.to_string())
    }

    /// Boolean value; absent, empty and unparsable values yield `default`
    pub fn get_env_bool(&self, key: &str, default: bool) -> bool {
        match self.get_trimmed(key) {
            None => default,
            Some(value) => parse_bool(&value, key).unwrap_or_else(|e| {
                tracing::warn!("{}; using default {}", e, default);
                default
            }),
        }
    }

    /// Integer value; absent, empty and unparsable values yield `default`
    pub fn get_env_int(&self, key: &str, default: i64) -> i64 {
        match self.get_trimmed(key) {
            None => default,
            Some(value) => parse_integer(&value, key).unwrap_or_else(|e| {
                tracing::warn!("{}; using default {}", e, default);
                default
            }),
        }
    }

    /// Non-negative integer that fits in `u32`; anything else yields `default`
    pub fn get_env_u32(&self, key: &str, default: u32) -> u32 {
        let value = self.get_env_int(key, i64::from(default));
        u32::try_from(value).unwrap_or_else(|_| {
            tracing::warn!("{} must be between 0 and {}, got {}; using default {}", key, u32::MAX, value, default);
            default
        })
    }

    /// Duration such as `30s`, `5m` or a plain number of seconds
    pub fn get_env_duration(&self, key: &str, default: Duration) -> Duration {
        match self.get_trimmed(key) {
            None => default,
            Some(value) => parse_duration_human(&value, key).unwrap_or_else(|e| {
                tracing::warn!("{}; using default {:?}", e, default);
                default
            }),
        }
    }

    /// Comma-separated list with blank entries dropped; absent or empty
    /// values yield `default`
    pub fn get_env_list(&self, key: &str, default: &[&str]) -> Vec<String> {
        let items: Vec<String> = self
            .get_trimmed(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() {
            default.iter().map(|item| item.to_string()).collect()
        } else {
            items
        }
    }

    /// Names from `keys` with no non-empty value
    pub fn missing_required_vars(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .filter(|key| self.get_trimmed(key).is_none())
            .map(|key| key.to_string())
            .collect()
    }

    /// Validate the URL stored under `key` against the allowed schemes
    pub fn validate_url_var(&self, key: &str, allowed_schemes: &[&str]) -> Result<(), String> {
        let url = self
            .get_trimmed(key)
            .ok_or_else(|| format!("{} is not set", key))?;
        validate_url_scheme(&url, allowed_schemes).map_err(|reason| format!("{}: {}", key, reason))
    }
}

impl EnvironmentProvider for ConfigBuilderBase {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

impl std::fmt::Debug for ConfigBuilderBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilderBase")
            .field("environment", &self.environment)
            .field("vars", &self.vars.len())
            .finish()
    }
}

/// Contract every specialized configuration builder implements
///
/// `get_debug_info` must never contain raw secret values; use the helpers in
/// [`crate::config::masking`].
pub trait ConfigBuilder {
    fn base(&self) -> &ConfigBuilderBase;

    /// Check the built configuration; never fails, returns `(is_valid, reason)`
    fn validate(&self) -> (bool, String);

    fn get_debug_info(&self) -> Value;

    fn environment(&self) -> Environment {
        self.base().environment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(vars: &[(&str, &str)]) -> ConfigBuilderBase {
        ConfigBuilderBase::from_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_override_none_removes_key() {
        let env = IsolatedEnvironment::isolated([("JWT_SECRET_KEY", "present"), ("ENVIRONMENT", "staging")]);
        let overrides = HashMap::from([
            ("JWT_SECRET_KEY".to_string(), None),
            ("EXTRA".to_string(), Some("added".to_string())),
        ]);

        let base = ConfigBuilderBase::with_overrides(&env, &overrides);

        assert_eq!(base.get_env("JWT_SECRET_KEY"), None);
        assert_eq!(base.get_env("EXTRA"), Some("added"));
        assert_eq!(base.environment(), Environment::Staging);
        // The store itself is untouched
        assert_eq!(env.get("JWT_SECRET_KEY"), Some("present".to_string()));
    }

    #[test]
    fn test_get_env_bool_defaults() {
        let base = base(&[("ON", "yes"), ("EMPTY", ""), ("JUNK", "perhaps")]);

        assert!(base.get_env_bool("ON", false));
        assert!(base.get_env_bool("EMPTY", true));
        assert!(!base.get_env_bool("MISSING", false));
        assert!(base.get_env_bool("JUNK", true));
    }

    #[test]
    fn test_get_env_int_defaults() {
        let base = base(&[("PORT", "6380"), ("BAD", "six"), ("BLANK", " ")]);

        assert_eq!(base.get_env_int("PORT", 6379), 6380);
        assert_eq!(base.get_env_int("BAD", 6379), 6379);
        assert_eq!(base.get_env_int("BLANK", 1), 1);
        assert_eq!(base.get_env_int("MISSING", 7), 7);
    }

    #[test]
    fn test_get_env_u32_rejects_negative() {
        let base = base(&[("POOL", "25"), ("NEG", "-3")]);

        assert_eq!(base.get_env_u32("POOL", 10), 25);
        assert_eq!(base.get_env_u32("NEG", 10), 10);
    }

    #[test]
    fn test_get_env_duration() {
        let base = base(&[("INTERVAL", "2m"), ("BAD", "soon"), ("HUGE", "400000000000000000m")]);

        assert_eq!(base.get_env_duration("INTERVAL", Duration::from_secs(30)), Duration::from_secs(120));
        assert_eq!(base.get_env_duration("BAD", Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(base.get_env_duration("HUGE", Duration::from_secs(30)), Duration::from_secs(30));
    }

    #[test]
    fn test_get_env_list() {
        let base = base(&[("ORIGINS", "a.com, b.com,,c.com "), ("EMPTY", " , ")]);

        assert_eq!(base.get_env_list("ORIGINS", &[]), vec!["a.com", "b.com", "c.com"]);
        assert_eq!(base.get_env_list("EMPTY", &["x"]), vec!["x"]);
        assert_eq!(base.get_env_list("MISSING", &["y", "z"]), vec!["y", "z"]);
    }

    #[test]
    fn test_missing_required_vars() {
        let base = base(&[("A", "1"), ("B", "  ")]);
        assert_eq!(base.missing_required_vars(&["A", "B", "C"]), vec!["B", "C"]);
    }

    #[test]
    fn test_validate_url_var() {
        let base = base(&[("DATABASE_URL", "postgresql://u:p@h:5432/db"), ("BAD_URL", "mysql://x")]);

        assert!(base.validate_url_var("DATABASE_URL", &["postgresql", "postgres"]).is_ok());
        assert!(base.validate_url_var("BAD_URL", &["postgresql"]).is_err());
        assert!(base.validate_url_var("MISSING_URL", &["postgresql"]).is_err());
    }

    #[test]
    fn test_pinned_environment() {
        let base = base(&[("ENVIRONMENT", "development")]).for_environment(Environment::Production);
        assert!(base.is_production());
    }
}
