use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::EnvironmentProvider;

/// Signal variables inspected by environment detection, in precedence order
pub const ENVIRONMENT_SIGNAL_VARS: &[&str] = &[
    "ENVIRONMENT",
    "ENV",
    "NETRA_ENVIRONMENT",
    "NETRA_ENV",
    "NODE_ENV",
    "AUTH_ENV",
    "K_SERVICE",
    "GCP_PROJECT_ID",
];

const PRODUCTION_PATTERNS: &[&str] = &["production", "prod"];
const STAGING_PATTERNS: &[&str] = &["staging", "stage"];
const TESTING_PATTERNS: &[&str] = &["testing", "test"];
const DEVELOPMENT_PATTERNS: &[&str] = &["development", "dev", "local"];

/// Deployment environment a configuration is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Upper-case suffix used for environment-specific keys (`JWT_SECRET_STAGING`)
    pub fn key_suffix(&self) -> &'static str {
        match self {
            Self::Development => "DEVELOPMENT",
            Self::Testing => "TESTING",
            Self::Staging => "STAGING",
            Self::Production => "PRODUCTION",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_staging(&self) -> bool {
        matches!(self, Self::Staging)
    }

    /// Development or testing: the environments where local fallbacks are allowed
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Development | Self::Testing)
    }

    /// Staging or production: the environments backed by real infrastructure
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }

    /// Detect the environment from the signal variables visible in `env`
    ///
    /// Pattern sets are tried in priority order (production, staging,
    /// testing, development) across all signal variables, so a production
    /// signal anywhere outranks a staging signal anywhere, and a Cloud Run
    /// `K_SERVICE` naming staging outranks a generic `ENVIRONMENT=development`.
    /// A `K_SERVICE` that matches nothing means an unlabelled Cloud Run
    /// deployment, which is treated as production.
    pub fn detect(env: &dyn EnvironmentProvider) -> Self {
        let signals: Vec<(&str, String)> = ENVIRONMENT_SIGNAL_VARS
            .iter()
            .filter_map(|name| env.get_trimmed(name).map(|v| (*name, v.to_lowercase())))
            .collect();

        let pattern_sets = [
            (Self::Production, PRODUCTION_PATTERNS),
            (Self::Staging, STAGING_PATTERNS),
            (Self::Testing, TESTING_PATTERNS),
            (Self::Development, DEVELOPMENT_PATTERNS),
        ];

        for (environment, patterns) in pattern_sets {
            for (name, value) in &signals {
                if patterns.iter().any(|p| value.contains(p)) {
                    tracing::debug!(
                        "Detected {} environment from {}={}",
                        environment, name, value
                    );
                    return environment;
                }
            }
        }

        if let Some(service) = env.get_trimmed("K_SERVICE") {
            tracing::warn!(
                "K_SERVICE '{}' carries no environment marker, assuming production",
                service
            );
            return Self::Production;
        }

        Self::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "testing" | "test" => Ok(Self::Testing),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("Unknown environment '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_to_development() {
        assert_eq!(Environment::detect(&env(&[])), Environment::Development);
    }

    #[test]
    fn test_explicit_environment_variable() {
        assert_eq!(Environment::detect(&env(&[("ENVIRONMENT", "staging")])), Environment::Staging);
        assert_eq!(Environment::detect(&env(&[("ENV", "PRODUCTION")])), Environment::Production);
        assert_eq!(Environment::detect(&env(&[("NODE_ENV", "test")])), Environment::Testing);
        assert_eq!(Environment::detect(&env(&[("AUTH_ENV", "dev")])), Environment::Development);
    }

    #[test]
    fn test_cloud_run_staging_outranks_generic_development() {
        let vars = env(&[
            ("ENVIRONMENT", "development"),
            ("K_SERVICE", "netra-staging-backend"),
        ]);
        assert_eq!(Environment::detect(&vars), Environment::Staging);
    }

    #[test]
    fn test_production_wins_over_staging_elsewhere() {
        let vars = env(&[
            ("ENVIRONMENT", "staging"),
            ("GCP_PROJECT_ID", "netra-production"),
        ]);
        assert_eq!(Environment::detect(&vars), Environment::Production);
    }

    #[test]
    fn test_unlabelled_cloud_run_service_is_production() {
        let vars = env(&[("K_SERVICE", "netra-backend")]);
        assert_eq!(Environment::detect(&vars), Environment::Production);
    }

    #[test]
    fn test_blank_signal_is_ignored() {
        let vars = env(&[("ENVIRONMENT", "  "), ("NETRA_ENV", "staging")]);
        assert_eq!(Environment::detect(&vars), Environment::Staging);
    }

    #[test]
    fn test_from_str_round_trips_display() {
        for environment in [
            Environment::Development,
            Environment::Testing,
            Environment::Staging,
            Environment::Production,
        ] {
            assert_eq!(environment.to_string().parse::<Environment>(), Ok(environment));
        }
        assert!("qa-cluster".parse::<Environment>().is_err());
    }
}
