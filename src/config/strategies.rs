//! Concrete secret sources used by the resolvers

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::errors::ConfigError;
use crate::config::gcp::{access_with_timeout, resolve_project_id, SecretManagerClient};
use crate::config::parsing::parse_bool;
use crate::config::resolver::{ResolutionScope, SecretStrategy};
use crate::config::{Environment, EnvironmentProvider, SecretInfo, SecretRequest, SecretSource};

/// Alternative and legacy variable names for well-known secrets
pub fn alternative_names(name: &str, environment: Environment) -> Vec<String> {
    match name {
        "SECRET_KEY" => ["SESSION_SECRET_KEY", "STARLETTE_SECRET_KEY", "APP_SECRET_KEY", "DJANGO_SECRET_KEY"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        "JWT_SECRET_KEY" => vec![
            format!("JWT_SECRET_{}", environment.key_suffix()),
            "JWT_SECRET".to_string(),
            "AUTH_JWT_SECRET".to_string(),
        ],
        "SERVICE_SECRET" => vec!["SERVICE_SECRET_KEY".to_string(), "INTER_SERVICE_SECRET".to_string()],
        _ => Vec::new(),
    }
}

/// Secret Manager id following the `<kebab-name>-<environment>` convention
pub fn conventional_secret_id(name: &str, environment: Environment) -> String {
    format!("{}-{}", kebab(name), environment)
}

fn kebab(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn random_alphanumeric(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Reproducible local secret: same name and environment, same value
pub fn deterministic_secret(name: &str, environment: Environment, min_length: usize) -> String {
    let digest = sha256_hex(&format!("{}:{}", name, environment));
    let mut value = format!("dev-{}-{}-{}", kebab(name), environment, digest);
    while value.chars().count() < min_length {
        value.push_str(&digest);
    }
    value.truncate(min_length.max(64));
    value
}

/// Staging-only emergency secret: stable hash prefix, random suffix
pub fn emergency_secret(project_id: &str, service_id: &str, name: &str, environment: Environment, min_length: usize) -> String {
    let digest = sha256_hex(&format!("{}-{}-{}-{}", project_id, service_id, name, environment));
    let mut value = format!("emergency-{}-{}", &digest[..32], random_alphanumeric(32));
    let length = value.chars().count();
    if length < min_length {
        value.push_str(&random_alphanumeric(min_length - length));
    }
    value
}

fn service_id(env: &dyn EnvironmentProvider) -> String {
    env.first_of(&["SERVICE_ID", "K_SERVICE"])
        .map(|(_, value)| value)
        .unwrap_or_else(|| "netra-backend".to_string())
}

/// Reads the variables listed by the request (by default, its own name)
pub struct EnvironmentVariableStrategy;

impl SecretStrategy for EnvironmentVariableStrategy {
    fn name(&self) -> &'static str {
        "environment_variable"
    }

    fn load(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
        for key in request.candidate_env_keys() {
            let Some(value) = scope.env.get_trimmed(&key) else {
                continue;
            };
            if value.chars().count() < request.min_length {
                tracing::warn!(
                    "{} is set but shorter than {} characters; ignoring it",
                    key, request.min_length
                );
                continue;
            }
            return Some(
                SecretInfo::new(value, SecretSource::EnvironmentVariable, scope.environment)
                    .with_note(format!("loaded from {}", key)),
            );
        }
        None
    }
}

/// Fetches from Google Cloud Secret Manager in staging and production
pub struct CloudSecretManagerStrategy {
    client: Option<Arc<dyn SecretManagerClient>>,
    timeout: Duration,
}

impl CloudSecretManagerStrategy {
    pub fn new(client: Option<Arc<dyn SecretManagerClient>>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl SecretStrategy for CloudSecretManagerStrategy {
    fn name(&self) -> &'static str {
        "gcp_secret_manager"
    }

    fn load(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
        if !scope.environment.is_deployed() {
            return None;
        }

        let disabled = scope
            .env
            .get_trimmed("DISABLE_GCP_SECRET_MANAGER")
            .map(|v| parse_bool(&v, "DISABLE_GCP_SECRET_MANAGER").unwrap_or(false))
            .unwrap_or(false);
        if disabled {
            tracing::debug!("Secret Manager disabled by DISABLE_GCP_SECRET_MANAGER");
            return None;
        }

        let Some(client) = &self.client else {
            tracing::debug!("No Secret Manager client configured");
            return None;
        };

        let Some(project_id) = resolve_project_id(scope.env) else {
            tracing::debug!("No GCP project id available; skipping Secret Manager");
            return None;
        };

        let mut secret_ids = vec![conventional_secret_id(&request.name, scope.environment)];
        if secret_ids[0] != request.name {
            secret_ids.push(request.name.clone());
        }

        for secret_id in secret_ids {
            if let Some(value) = access_with_timeout(Arc::clone(client), &project_id, &secret_id, self.timeout) {
                return Some(
                    SecretInfo::new(value, SecretSource::GcpSecretManager, scope.environment)
                        .with_note(format!("projects/{}/secrets/{}/versions/latest", project_id, secret_id)),
                );
            }
        }

        None
    }
}

/// Legacy and framework-specific aliases (`DJANGO_SECRET_KEY`, `JWT_SECRET`, ...)
pub struct AlternativeNamesStrategy;

impl SecretStrategy for AlternativeNamesStrategy {
    fn name(&self) -> &'static str {
        "alternative_names"
    }

    fn load(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
        alternative_names(&request.name, scope.environment)
            .into_iter()
            .find_map(|alias| {
                let value = scope.env.get_trimmed(&alias)?;
                (value.chars().count() >= request.min_length).then(|| {
                    tracing::warn!("Secret '{}' resolved from legacy name {}", request.name, alias);
                    SecretInfo::new(value, SecretSource::EnvironmentVariable, scope.environment)
                        .with_note(format!("resolved from alternative name {}", alias))
                })
            })
    }
}

/// Values from a flat JSON configuration file, development and testing only
#[derive(Default)]
pub struct ConfigFileStrategy {
    values: HashMap<String, String>,
}

impl ConfigFileStrategy {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Load a JSON object of string, number or boolean values
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::parse(path.display().to_string(), e.to_string()))?;

        let Value::Object(map) = parsed else {
            return Err(ConfigError::invalid_setting(
                path.display().to_string(),
                "configuration file must contain a JSON object",
            ));
        };

        let values = map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Bool(b) => Some((key, b.to_string())),
                _ => None,
            })
            .collect();

        Ok(Self { values })
    }

    /// Load from `NETRA_CONFIG_FILE` if set; problems are logged and yield
    /// an empty strategy
    pub fn from_env(env: &dyn EnvironmentProvider) -> Self {
        let Some(path) = env.get_trimmed("NETRA_CONFIG_FILE") else {
            return Self::default();
        };

        Self::from_path(Path::new(&path)).unwrap_or_else(|e| {
            tracing::warn!("Ignoring configuration file {}: {}", path, e);
            Self::default()
        })
    }
}

impl SecretStrategy for ConfigFileStrategy {
    fn name(&self) -> &'static str {
        "config_file"
    }

    fn load(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
        if !scope.environment.is_local() {
            return None;
        }

        let value = self
            .values
            .get(&request.name)
            .or_else(|| self.values.get(&request.name.to_lowercase()))?
            .trim();

        (!value.is_empty()).then(|| {
            SecretInfo::new(value, SecretSource::ConfigurationFile, scope.environment)
        })
    }
}

/// Last resort: synthesize a value where policy allows it
///
/// Development and testing get a deterministic value so local runs are
/// reproducible. Staging gets an emergency value flagged as generated.
/// Production gets nothing.
pub struct FallbackGenerationStrategy;

impl SecretStrategy for FallbackGenerationStrategy {
    fn name(&self) -> &'static str {
        "fallback_generation"
    }

    fn load(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
        if !request.secret_type.allows_generation() {
            return None;
        }

        match scope.environment {
            Environment::Production => {
                tracing::error!(
                    "Refusing to generate '{}' in production; it must come from the environment or Secret Manager",
                    request.name
                );
                None
            }
            Environment::Staging => {
                let project_id = resolve_project_id(scope.env).unwrap_or_else(|| "unknown-project".to_string());
                let value = emergency_secret(
                    &project_id,
                    &service_id(scope.env),
                    &request.name,
                    scope.environment,
                    request.min_length,
                );
                tracing::warn!(
                    "Generated emergency value for '{}' in staging; Secret Manager is unreachable or missing this secret",
                    request.name
                );
                Some(
                    SecretInfo::new(value, SecretSource::EmergencyGenerated, scope.environment)
                        .with_fallback(true)
                        .with_generated(true)
                        .with_note(
                            "Emergency generated secret: should only occur when Secret Manager is unreachable. \
                             Sessions and tokens signed with it will not survive a restart.",
                        ),
                )
            }
            Environment::Development | Environment::Testing => {
                let value = deterministic_secret(&request.name, scope.environment, request.min_length);
                tracing::debug!("Using deterministic {} value for '{}'", scope.environment, request.name);
                Some(
                    SecretInfo::new(value, SecretSource::DevelopmentFallback, scope.environment)
                        .with_fallback(true)
                        .with_generated(true)
                        .with_note("Deterministic local value; set the variable explicitly to override"),
                )
            }
        }
    }
}
