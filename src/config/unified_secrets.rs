//! Named-secret orchestration with a fixed fallback pipeline
//!
//! Strategy order: environment variable, Secret Manager, alternative
//! names, configuration file, fallback generation. The first value that
//! meets the request's minimum length is cached under
//! `(name, environment)` and served from the cache until cleared.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::cache::SecretCache;
use crate::config::errors::SecretError;
use crate::config::gcp::{timeout_from_env, SecretManagerClient};
use crate::config::resolver::{ResolutionScope, SecretResolver, SecretStrategy};
use crate::config::strategies::{
    AlternativeNamesStrategy, CloudSecretManagerStrategy, ConfigFileStrategy, EnvironmentVariableStrategy,
    FallbackGenerationStrategy,
};
use crate::config::{Environment, IsolatedEnvironment, SecretInfo, SecretRequest, SecretSource, SecretType};

/// Secrets checked by [`UnifiedSecretManager::validate_all_secrets`]: name, type, required
pub const CRITICAL_SECRETS: &[(&str, SecretType, bool)] = &[
    ("SECRET_KEY", SecretType::SessionKey, true),
    ("JWT_SECRET_KEY", SecretType::JwtSigning, false),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretStatusKind {
    Valid,
    Fallback,
    Missing,
    Error,
}

/// Per-secret entry of a [`SecretValidationReport`]
#[derive(Debug, Clone, Serialize)]
pub struct SecretStatus {
    pub required: bool,
    pub status: SecretStatusKind,
    pub source: Option<SecretSource>,
    pub length: usize,
    pub is_fallback: bool,
    pub is_generated: bool,
    pub notes: Vec<String>,
}

/// Output of [`UnifiedSecretManager::validate_all_secrets`]; consumed by diagnostic tooling
#[derive(Debug, Clone, Serialize)]
pub struct SecretValidationReport {
    pub environment: Environment,
    pub overall_status: HealthStatus,
    pub secrets: BTreeMap<String, SecretStatus>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

pub struct UnifiedSecretManager {
    env: Arc<IsolatedEnvironment>,
    resolver: SecretResolver,
    cache: Arc<SecretCache>,
    pinned_environment: Option<Environment>,
}

impl UnifiedSecretManager {
    pub fn new(
        env: Arc<IsolatedEnvironment>,
        client: Option<Arc<dyn SecretManagerClient>>,
        cache: Arc<SecretCache>,
    ) -> Self {
        let timeout = timeout_from_env(env.as_ref());
        let strategies: Vec<Box<dyn SecretStrategy>> = vec![
            Box::new(EnvironmentVariableStrategy),
            Box::new(CloudSecretManagerStrategy::new(client, timeout)),
            Box::new(AlternativeNamesStrategy),
            Box::new(ConfigFileStrategy::from_env(env.as_ref())),
            Box::new(FallbackGenerationStrategy),
        ];

        Self {
            env,
            resolver: SecretResolver::new(strategies),
            cache,
            pinned_environment: None,
        }
    }

    /// Resolve for `environment` instead of detecting it on every call
    pub fn for_environment(mut self, environment: Environment) -> Self {
        self.pinned_environment = Some(environment);
        self
    }

    pub fn environment(&self) -> Environment {
        self.pinned_environment
            .unwrap_or_else(|| Environment::detect(self.env.as_ref()))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.resolver.strategy_names()
    }

    fn resolve(&self, request: &SecretRequest) -> Result<SecretInfo, SecretError> {
        let environment = self.environment();

        if let Some(cached) = self.cache.get_valid(&request.name, environment, request.min_length) {
            tracing::debug!("Secret '{}' served from cache ({})", request.name, environment);
            return Ok(cached);
        }

        let scope = ResolutionScope::new(environment, self.env.as_ref());
        let resolution = self.resolver.resolve(request, &scope);

        match resolution.secret {
            Some(info) => Ok(self.cache.get_or_insert(&request.name, info)),
            None => Err(SecretError::not_found(&request.name, environment, resolution.attempted)),
        }
    }

    /// Resolve one secret
    ///
    /// # Errors
    /// Returns `SecretError::NotFound`, listing every strategy tried, when
    /// the request is required and nothing produced a value. Optional
    /// requests yield `Ok(None)` instead.
    pub fn get_secret(&self, request: &SecretRequest) -> Result<Option<SecretInfo>, SecretError> {
        match self.resolve(request) {
            Ok(info) => Ok(Some(info)),
            Err(e) if request.required => {
                tracing::error!("{}", e);
                Err(e)
            }
            Err(e) => {
                tracing::warn!("Optional secret unavailable: {}", e);
                Ok(None)
            }
        }
    }

    /// `SECRET_KEY`, required
    pub fn get_session_secret(&self) -> Result<SecretInfo, SecretError> {
        self.resolve(&SecretRequest::new("SECRET_KEY", SecretType::SessionKey))
            .inspect_err(|e| tracing::error!("{}", e))
    }

    /// `JWT_SECRET_KEY`, required
    ///
    /// Reads `JWT_SECRET_KEY` first and reaches `JWT_SECRET_<ENV>` through
    /// the alias table. `SecretManagerBuilder::auth().get_jwt_secret()`
    /// prefers the environment-specific key instead, so the two can disagree
    /// when both variables are set.
    pub fn get_jwt_secret(&self) -> Result<SecretInfo, SecretError> {
        self.resolve(&SecretRequest::new("JWT_SECRET_KEY", SecretType::JwtSigning))
            .inspect_err(|e| tracing::error!("{}", e))
    }

    /// Store a value resolved elsewhere; it wins over the strategy chain
    /// until the cache is cleared. Generated production values are refused.
    pub fn cache_secret(&self, name: &str, info: SecretInfo) -> bool {
        self.cache.cache_secret(name, info)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn validate_all_secrets(&self) -> SecretValidationReport {
        let environment = self.environment();
        let mut secrets = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        for (name, secret_type, required) in CRITICAL_SECRETS {
            let request = SecretRequest::new(*name, *secret_type).required(*required);

            let status = match self.get_secret(&request) {
                Ok(Some(info)) => {
                    let kind = if info.is_fallback() {
                        warnings.push(format!(
                            "{} is using a fallback value ({}) in {}",
                            name,
                            info.source(),
                            environment
                        ));
                        SecretStatusKind::Fallback
                    } else {
                        SecretStatusKind::Valid
                    };
                    SecretStatus {
                        required: *required,
                        status: kind,
                        source: Some(info.source()),
                        length: info.length(),
                        is_fallback: info.is_fallback(),
                        is_generated: info.is_generated(),
                        notes: info.validation_notes().to_vec(),
                    }
                }
                Ok(None) => {
                    warnings.push(format!("Optional secret {} is not configured", name));
                    missing_status(*required, SecretStatusKind::Missing, Vec::new())
                }
                Err(e) => {
                    errors.push(e.to_string());
                    missing_status(*required, SecretStatusKind::Error, vec![e.to_string()])
                }
            };

            secrets.insert(name.to_string(), status);
        }

        let overall_status = if !errors.is_empty() {
            HealthStatus::Error
        } else if !warnings.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        tracing::info!(
            "Secret validation for {}: {} ({} warnings, {} errors)",
            environment,
            overall_status,
            warnings.len(),
            errors.len()
        );

        SecretValidationReport {
            environment,
            overall_status,
            secrets,
            warnings,
            errors,
            checked_at: Utc::now(),
        }
    }
}

fn missing_status(required: bool, status: SecretStatusKind, notes: Vec<String>) -> SecretStatus {
    SecretStatus {
        required,
        status,
        source: None,
        length: 0,
        is_fallback: false,
        is_generated: false,
        notes,
    }
}

impl std::fmt::Debug for UnifiedSecretManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedSecretManager")
            .field("environment", &self.environment())
            .field("strategies", &self.resolver.strategy_names())
            .field("cache", &self.cache)
            .finish()
    }
}
