use crate::config::{Environment, EnvironmentProvider, SecretInfo, SecretRequest};

/// Everything a strategy may look at while resolving one request
pub struct ResolutionScope<'a> {
    pub environment: Environment,
    pub env: &'a dyn EnvironmentProvider,
}

impl<'a> ResolutionScope<'a> {
    pub fn new(environment: Environment, env: &'a dyn EnvironmentProvider) -> Self {
        Self { environment, env }
    }
}

/// One source a secret can be loaded from
///
/// Strategies never fail: anything that goes wrong (missing variable,
/// unreachable API, policy forbidding the source) is a `None` and the
/// resolver moves on.
pub trait SecretStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo>;
}

/// Outcome of walking a strategy chain
#[derive(Debug)]
pub struct Resolution {
    pub secret: Option<SecretInfo>,
    /// Names of the strategies consulted, in order
    pub attempted: Vec<String>,
}

/// Ordered chain of strategies; the first acceptable value wins
pub struct SecretResolver {
    strategies: Vec<Box<dyn SecretStrategy>>,
}

impl SecretResolver {
    pub fn new(strategies: Vec<Box<dyn SecretStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(&self, request: &SecretRequest, scope: &ResolutionScope<'_>) -> Resolution {
        let mut attempted = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            attempted.push(strategy.name().to_string());

            let Some(info) = strategy.load(request, scope) else {
                tracing::debug!(
                    "Strategy {} produced no value for '{}' in {}",
                    strategy.name(),
                    request.name,
                    scope.environment
                );
                continue;
            };

            if info.length() < request.min_length {
                tracing::warn!(
                    "Strategy {} produced '{}' with length {}, below minimum {}",
                    strategy.name(),
                    request.name,
                    info.length(),
                    request.min_length
                );
                continue;
            }

            // Production never accepts a synthesized secret, whatever the strategy claims
            if scope.environment.is_production() && info.is_generated() {
                tracing::error!(
                    "Strategy {} offered a generated value for '{}' in production; rejected",
                    strategy.name(),
                    request.name
                );
                continue;
            }

            tracing::info!(
                "Resolved secret '{}' from {} ({} environment, fallback={})",
                request.name,
                info.source(),
                scope.environment,
                info.is_fallback()
            );
            return Resolution {
                secret: Some(info),
                attempted,
            };
        }

        Resolution {
            secret: None,
            attempted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SecretSource, SecretType};
    use std::collections::HashMap;

    struct Fixed {
        name: &'static str,
        value: Option<&'static str>,
        generated: bool,
    }

    impl SecretStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn load(&self, _request: &SecretRequest, scope: &ResolutionScope<'_>) -> Option<SecretInfo> {
            self.value.map(|v| {
                SecretInfo::new(v, SecretSource::EmergencyGenerated, scope.environment)
                    .with_generated(self.generated)
            })
        }
    }

    fn fixed(name: &'static str, value: Option<&'static str>, generated: bool) -> Box<dyn SecretStrategy> {
        Box::new(Fixed { name, value, generated })
    }

    #[test]
    fn test_first_acceptable_value_wins() {
        let resolver = SecretResolver::new(vec![
            fixed("empty", None, false),
            fixed("short", Some("abc"), false),
            fixed("good", Some("long-enough-value"), false),
            fixed("never", Some("unreached-value-xx"), false),
        ]);
        let vars = HashMap::<String, String>::new();
        let scope = ResolutionScope::new(Environment::Staging, &vars);
        let request = SecretRequest::new("X", SecretType::Generic).min_length(8);

        let resolution = resolver.resolve(&request, &scope);

        assert_eq!(resolution.secret.unwrap().value(), "long-enough-value");
        assert_eq!(resolution.attempted, vec!["empty", "short", "good"]);
    }

    #[test]
    fn test_generated_values_rejected_in_production() {
        let resolver = SecretResolver::new(vec![fixed("generator", Some("generated-secret-value"), true)]);
        let vars = HashMap::<String, String>::new();
        let request = SecretRequest::new("X", SecretType::Generic).min_length(4);

        let prod = resolver.resolve(&request, &ResolutionScope::new(Environment::Production, &vars));
        assert!(prod.secret.is_none());
        assert_eq!(prod.attempted, vec!["generator"]);

        let staging = resolver.resolve(&request, &ResolutionScope::new(Environment::Staging, &vars));
        assert!(staging.secret.is_some());
    }
}
