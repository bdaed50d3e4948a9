use std::fmt;

/// What a secret is used for; decides whether a generated fallback is acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretType {
    SessionKey,
    JwtSigning,
    ServiceSecret,
    DatabasePassword,
    RedisPassword,
    ApiKey,
    Generic,
}

impl SecretType {
    /// Signing keys can be synthesized locally; passwords and API keys
    /// belong to someone else and cannot
    pub fn allows_generation(&self) -> bool {
        matches!(
            self,
            Self::SessionKey | Self::JwtSigning | Self::ServiceSecret | Self::Generic
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionKey => "session_key",
            Self::JwtSigning => "jwt_signing",
            Self::ServiceSecret => "service_secret",
            Self::DatabasePassword => "database_password",
            Self::RedisPassword => "redis_password",
            Self::ApiKey => "api_key",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_MIN_SECRET_LENGTH: usize = 32;

/// Configuration for a single secret lookup
#[derive(Debug, Clone)]
pub struct SecretRequest {
    /// Canonical secret name (`SECRET_KEY`, `JWT_SECRET_KEY`, ...)
    pub name: String,
    pub secret_type: SecretType,
    /// Minimum accepted length in characters
    pub min_length: usize,
    /// Whether resolution failure is an error
    pub required: bool,
    /// Environment variables to try, in order; defaults to just `name`
    pub env_keys: Option<Vec<String>>,
}

impl SecretRequest {
    pub fn new(name: impl Into<String>, secret_type: SecretType) -> Self {
        Self {
            name: name.into(),
            secret_type,
            min_length: DEFAULT_MIN_SECRET_LENGTH,
            required: true,
            env_keys: None,
        }
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.min_length = length;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn env_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Environment variable names to consult for this request
    pub fn candidate_env_keys(&self) -> Vec<String> {
        self.env_keys
            .clone()
            .unwrap_or_else(|| vec![self.name.clone()])
    }
}
