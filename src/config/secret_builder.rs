use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::builder_base::{ConfigBuilder, ConfigBuilderBase};
use crate::config::errors::SecretError;
use crate::config::resolver::{ResolutionScope, SecretResolver, SecretStrategy};
use crate::config::shared_secrets::{looks_like_placeholder, SharedSecretManager, SharedSecretStrategy};
use crate::config::strategies::EnvironmentVariableStrategy;
use crate::config::{Environment, SecretRequest, SecretType, DEFAULT_MIN_SECRET_LENGTH};

/// JWT minimum in the testing environment, where fixtures use short keys
pub const TESTING_JWT_MIN_LENGTH: usize = 4;

/// Per-service secret resolution
///
/// Each getter walks the service's own variables (most specific first) and
/// then defers to the [`SharedSecretManager`] when one is attached.
pub struct SecretManagerBuilder {
    base: ConfigBuilderBase,
    resolver: SecretResolver,
    unavailable: bool,
}

impl SecretManagerBuilder {
    pub fn new(base: ConfigBuilderBase, shared: Option<Arc<SharedSecretManager>>) -> Self {
        let mut strategies: Vec<Box<dyn SecretStrategy>> = vec![Box::new(EnvironmentVariableStrategy)];
        if let Some(shared) = shared {
            strategies.push(Box::new(SharedSecretStrategy::new(shared)));
        }

        Self {
            base,
            resolver: SecretResolver::new(strategies),
            unavailable: false,
        }
    }

    /// Every secret getter fails as if nothing were configured
    ///
    /// For exercising failure paths of callers without clearing the
    /// environment.
    pub fn simulate_unavailable(mut self) -> Self {
        tracing::debug!("SecretManagerBuilder running in simulated-unavailable mode");
        self.unavailable = true;
        self
    }

    pub fn auth(&self) -> AuthSecrets<'_> {
        AuthSecrets { builder: self }
    }

    pub fn database(&self) -> PasswordSecrets<'_> {
        PasswordSecrets {
            builder: self,
            name: "POSTGRES_PASSWORD",
            secret_type: SecretType::DatabasePassword,
        }
    }

    pub fn redis(&self) -> PasswordSecrets<'_> {
        PasswordSecrets {
            builder: self,
            name: "REDIS_PASSWORD",
            secret_type: SecretType::RedisPassword,
        }
    }

    /// Minimum accepted length for signing secrets in this environment
    pub fn signing_min_length(&self) -> usize {
        match self.base.environment() {
            Environment::Testing => TESTING_JWT_MIN_LENGTH,
            _ => DEFAULT_MIN_SECRET_LENGTH,
        }
    }

    fn resolve(&self, request: &SecretRequest) -> Option<String> {
        if self.unavailable {
            return None;
        }
        let scope = ResolutionScope::new(self.base.environment(), &self.base);
        self.resolver
            .resolve(request, &scope)
            .secret
            .map(|info| info.into_value())
    }
}

impl fmt::Debug for SecretManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretManagerBuilder")
            .field("environment", &self.base.environment())
            .field("strategies", &self.resolver.strategy_names())
            .field("unavailable", &self.unavailable)
            .finish()
    }
}

/// JWT and inter-service secrets
pub struct AuthSecrets<'a> {
    builder: &'a SecretManagerBuilder,
}

impl AuthSecrets<'_> {
    /// `JWT_SECRET_<ENV>`, then `JWT_SECRET_KEY`, then `JWT_SECRET`, then the shared manager
    pub fn get_jwt_secret(&self) -> Result<String, SecretError> {
        let environment = self.builder.base.environment();
        let request = SecretRequest::new("JWT_SECRET_KEY", SecretType::JwtSigning)
            .min_length(self.builder.signing_min_length())
            .env_keys([
                format!("JWT_SECRET_{}", environment.key_suffix()),
                "JWT_SECRET_KEY".to_string(),
                "JWT_SECRET".to_string(),
            ]);

        self.builder.resolve(&request).ok_or_else(|| {
            tracing::error!("JWT secret is not available in {} environment", environment);
            SecretError::JwtSecretUnavailable
        })
    }

    /// `SERVICE_SECRET`, then the shared manager
    pub fn get_service_secret(&self) -> Result<String, SecretError> {
        let request = SecretRequest::new("SERVICE_SECRET", SecretType::ServiceSecret)
            .min_length(self.builder.signing_min_length());

        self.builder
            .resolve(&request)
            .ok_or(SecretError::ServiceSecretUnavailable)
    }
}

/// Infrastructure password lookup (`POSTGRES_PASSWORD`, `REDIS_PASSWORD`)
pub struct PasswordSecrets<'a> {
    builder: &'a SecretManagerBuilder,
    name: &'static str,
    secret_type: SecretType,
}

impl PasswordSecrets<'_> {
    /// `<NAME>_<ENV>`, then `<NAME>`, then Secret Manager; never generated
    pub fn get_password(&self) -> Option<String> {
        let environment = self.builder.base.environment();
        let request = SecretRequest::new(self.name, self.secret_type)
            .min_length(1)
            .required(false)
            .env_keys([
                format!("{}_{}", self.name, environment.key_suffix()),
                self.name.to_string(),
            ]);

        self.builder.resolve(&request)
    }
}

#[derive(Serialize, Deserialize)]
struct ProbeClaims {
    sub: String,
    exp: i64,
}

/// Sign and verify a throwaway HS256 token with `secret`
pub fn probe_jwt_secret(secret: &str) -> Result<(), String> {
    let claims = ProbeClaims {
        sub: "config-probe".to_string(),
        exp: Utc::now().timestamp() + 60,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT secret cannot sign tokens: {}", e))?;

    decode::<ProbeClaims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| format!("JWT secret cannot verify its own tokens: {}", e))?;

    Ok(())
}

impl ConfigBuilder for SecretManagerBuilder {
    fn base(&self) -> &ConfigBuilderBase {
        &self.base
    }

    fn validate(&self) -> (bool, String) {
        let secret = match self.auth().get_jwt_secret() {
            Ok(secret) => secret,
            Err(e) => return (false, e.to_string()),
        };

        if self.base.environment().is_deployed() && looks_like_placeholder(&secret) {
            return (false, "JWT secret looks like a placeholder value".to_string());
        }

        if let Err(reason) = probe_jwt_secret(&secret) {
            return (false, reason);
        }

        (true, "JWT secret is configured".to_string())
    }

    fn get_debug_info(&self) -> Value {
        let jwt = self.auth().get_jwt_secret().ok();
        let service = self.auth().get_service_secret().ok();
        let jwt_valid = jwt.as_deref().map(|s| probe_jwt_secret(s).is_ok()).unwrap_or(false);

        json!({
            "environment": self.base.environment(),
            "simulate_unavailable": self.unavailable,
            "jwt_secret": {
                "available": jwt.is_some(),
                "length": jwt.as_ref().map(|s| s.chars().count()).unwrap_or(0),
                "valid": jwt_valid,
            },
            "service_secret": {
                "available": service.is_some(),
                "length": service.as_ref().map(|s| s.chars().count()).unwrap_or(0),
            },
            "database_password_set": self.database().get_password().is_some(),
            "redis_password_set": self.redis().get_password().is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cache::SecretCache;
    use std::time::Duration;

    fn base(vars: &[(&str, &str)]) -> ConfigBuilderBase {
        ConfigBuilderBase::from_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn shared() -> Arc<SharedSecretManager> {
        Arc::new(SharedSecretManager::new(None, Duration::from_secs(1), Arc::new(SecretCache::new())))
    }

    const LONG_SECRET: &str = "a-jwt-secret-that-is-definitely-longer-than-32";

    #[test]
    fn test_environment_specific_jwt_key_wins() {
        let builder = SecretManagerBuilder::new(
            base(&[
                ("ENVIRONMENT", "staging"),
                ("JWT_SECRET_STAGING", "staging-specific-jwt-secret-value-0123456789"),
                ("JWT_SECRET_KEY", LONG_SECRET),
            ]),
            None,
        );

        assert_eq!(
            builder.auth().get_jwt_secret().unwrap(),
            "staging-specific-jwt-secret-value-0123456789"
        );
    }

    #[test]
    fn test_jwt_candidates_are_trimmed_and_length_checked() {
        let builder = SecretManagerBuilder::new(
            base(&[
                ("ENVIRONMENT", "development"),
                ("JWT_SECRET_KEY", "too-short"),
                ("JWT_SECRET", format!("  {}  ", LONG_SECRET).as_str()),
            ]),
            None,
        );

        assert_eq!(builder.auth().get_jwt_secret().unwrap(), LONG_SECRET);
    }

    #[test]
    fn test_testing_environment_accepts_short_jwt() {
        let builder = SecretManagerBuilder::new(base(&[("ENVIRONMENT", "testing"), ("JWT_SECRET_KEY", "abcd")]), None);
        assert_eq!(builder.auth().get_jwt_secret().unwrap(), "abcd");
    }

    #[test]
    fn test_simulate_unavailable_fails_even_when_configured() {
        let builder = SecretManagerBuilder::new(
            base(&[("ENVIRONMENT", "development"), ("JWT_SECRET_KEY", LONG_SECRET)]),
            None,
        )
        .simulate_unavailable();

        let err = builder.auth().get_jwt_secret().unwrap_err();
        assert_eq!(err.to_string(), "JWT secret is not available");
        assert!(!builder.validate().0);
    }

    #[test]
    fn test_jwt_falls_through_to_shared_manager() {
        let builder = SecretManagerBuilder::new(base(&[("ENVIRONMENT", "development")]), Some(shared()));

        let secret = builder.auth().get_jwt_secret().unwrap();
        assert!(secret.starts_with("dev-jwt-secret-key-development"));
        assert!(builder.validate().0);
    }

    #[test]
    fn test_production_without_jwt_fails() {
        let builder = SecretManagerBuilder::new(base(&[("ENVIRONMENT", "production")]), Some(shared()));

        assert_eq!(builder.auth().get_jwt_secret(), Err(SecretError::JwtSecretUnavailable));
        let (ok, reason) = builder.validate();
        assert!(!ok);
        assert!(reason.contains("JWT secret is not available"));
    }

    #[test]
    fn test_passwords_prefer_environment_specific_key() {
        let builder = SecretManagerBuilder::new(
            base(&[
                ("ENVIRONMENT", "staging"),
                ("REDIS_PASSWORD_STAGING", "staging-redis-pw"),
                ("REDIS_PASSWORD", "generic-pw"),
                ("POSTGRES_PASSWORD", "pg-pw"),
            ]),
            Some(shared()),
        );

        assert_eq!(builder.redis().get_password().as_deref(), Some("staging-redis-pw"));
        assert_eq!(builder.database().get_password().as_deref(), Some("pg-pw"));
    }

    #[test]
    fn test_passwords_are_never_generated() {
        let builder = SecretManagerBuilder::new(base(&[("ENVIRONMENT", "development")]), Some(shared()));
        assert_eq!(builder.redis().get_password(), None);
    }

    #[test]
    fn test_debug_info_never_contains_values() {
        let builder = SecretManagerBuilder::new(
            base(&[
                ("ENVIRONMENT", "development"),
                ("JWT_SECRET_KEY", LONG_SECRET),
                ("SERVICE_SECRET", "service-secret-value-that-is-long-enough-1"),
            ]),
            None,
        );

        let info = builder.get_debug_info().to_string();
        assert!(!info.contains(LONG_SECRET));
        assert!(!info.contains("service-secret-value"));
        assert_eq!(builder.get_debug_info()["jwt_secret"]["valid"], true);
    }

    #[test]
    fn test_debug_info_length_counts_characters() {
        let secret = "ü".repeat(40);
        let builder = SecretManagerBuilder::new(
            base(&[("ENVIRONMENT", "development"), ("JWT_SECRET_KEY", secret.as_str())]),
            None,
        );

        assert_eq!(builder.get_debug_info()["jwt_secret"]["length"], 40);
    }

    #[test]
    fn test_probe_jwt_secret() {
        assert!(probe_jwt_secret(LONG_SECRET).is_ok());
    }
}
