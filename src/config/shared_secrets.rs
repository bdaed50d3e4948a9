use std::sync::Arc;
use std::time::Duration;

use crate::config::cache::SecretCache;
use crate::config::gcp::SecretManagerClient;
use crate::config::resolver::{ResolutionScope, SecretResolver, SecretStrategy};
use crate::config::strategies::{CloudSecretManagerStrategy, FallbackGenerationStrategy};
use crate::config::{Environment, SecretInfo, SecretRequest};

/// Substrings that mark a value as a template placeholder rather than a real credential
pub const PLACEHOLDER_MARKERS: &[&str] = &[
    "password",
    "changeme",
    "redis",
    "secret",
    "placeholder",
    "your-",
    "replace",
];

pub const PRODUCTION_MIN_PASSWORD_LENGTH: usize = 16;
pub const STAGING_MIN_PASSWORD_LENGTH: usize = 8;

pub fn looks_like_placeholder(value: &str) -> bool {
    let lowered = value.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Cross-service secret authority
///
/// Final stop for the per-service builders: consults Secret Manager and
/// then the environment's fallback policy. Results land in the process
/// cache shared with [`crate::config::UnifiedSecretManager`], so both paths
/// hand out the same value for the same `(name, environment)`.
pub struct SharedSecretManager {
    resolver: SecretResolver,
    cache: Arc<SecretCache>,
}

impl SharedSecretManager {
    pub fn new(client: Option<Arc<dyn SecretManagerClient>>, timeout: Duration, cache: Arc<SecretCache>) -> Self {
        let strategies: Vec<Box<dyn SecretStrategy>> = vec![
            Box::new(CloudSecretManagerStrategy::new(client, timeout)),
            Box::new(FallbackGenerationStrategy),
        ];
        Self {
            resolver: SecretResolver::new(strategies),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<SecretCache> {
        &self.cache
    }

    pub fn resolve(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
        if let Some(cached) = self.cache.get_valid(&request.name, scope.environment, request.min_length) {
            return Some(cached);
        }

        let resolution = self.resolver.resolve(request, scope);
        resolution
            .secret
            .map(|info| self.cache.get_or_insert(&request.name, info))
    }

    /// Strength policy for infrastructure passwords
    ///
    /// Development accepts anything, including no password. Staging and
    /// production require a non-placeholder value of the environment's
    /// minimum length.
    pub fn validate_password_strength(name: &str, password: &str, environment: Environment) -> (bool, String) {
        let min_length = match environment {
            Environment::Production => PRODUCTION_MIN_PASSWORD_LENGTH,
            Environment::Staging => STAGING_MIN_PASSWORD_LENGTH,
            Environment::Development | Environment::Testing => {
                return (true, format!("{} accepted in {}", name, environment));
            }
        };

        let length = password.chars().count();
        if length == 0 {
            return (false, format!("{} is required in {}", name, environment));
        }
        if length < min_length {
            return (
                false,
                format!(
                    "{} must be at least {} characters in {} (got {})",
                    name, min_length, environment, length
                ),
            );
        }
        if looks_like_placeholder(password) {
            return (
                false,
                format!("{} looks like a placeholder value; set a real credential", name),
            );
        }

        (true, format!("{} meets {} requirements", name, environment))
    }
}

impl std::fmt::Debug for SharedSecretManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretManager")
            .field("strategies", &self.resolver.strategy_names())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Delegates to the [`SharedSecretManager`]
pub struct SharedSecretStrategy {
    shared: Arc<SharedSecretManager>,
}

impl SharedSecretStrategy {
    pub fn new(shared: Arc<SharedSecretManager>) -> Self {
        Self { shared }
    }
}

impl SecretStrategy for SharedSecretStrategy {
    fn name(&self) -> &'static str {
        "shared_secret_manager"
    }

    fn load(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
        self.shared.resolve(request, scope)
    }
}
