//! Google Cloud Secret Manager access
//!
//! The client is reached through [`SecretManagerClient`] so resolution code
//! never depends on the transport. Every call made by the resolution layer
//! goes through [`access_with_timeout`], which bounds the wait regardless
//! of how the client behaves.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::config::EnvironmentProvider;
use crate::config::errors::SecretError;

pub const DEFAULT_SECRET_MANAGER_TIMEOUT: Duration = Duration::from_secs(5);

const SECRET_MANAGER_API: &str = "https://secretmanager.googleapis.com/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Project id variables, in lookup order
pub const PROJECT_ID_VARS: &[&str] = &["GCP_PROJECT_ID", "GOOGLE_CLOUD_PROJECT", "GCP_PROJECT"];

/// Capability interface for a cloud secret store
pub trait SecretManagerClient: Send + Sync {
    /// Whether the client can authenticate at all
    fn is_available(&self) -> bool;

    /// Fetch the latest version of `secret_name`; `None` on any failure
    fn access_secret(&self, project_id: &str, secret_name: &str) -> Option<String>;
}

/// Resolve the GCP project id from the environment
pub fn resolve_project_id(env: &dyn EnvironmentProvider) -> Option<String> {
    env.first_of(PROJECT_ID_VARS).map(|(_, value)| value)
}

/// Read the outbound call timeout (`SECRET_MANAGER_TIMEOUT_SECONDS`)
pub fn timeout_from_env(env: &dyn EnvironmentProvider) -> Duration {
    env.get_trimmed("SECRET_MANAGER_TIMEOUT_SECONDS")
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SECRET_MANAGER_TIMEOUT)
}

/// Run `access_secret` on a worker thread and give up after `timeout`
///
/// A hung call leaves its worker thread behind, but the caller moves on to
/// the next strategy.
pub fn access_with_timeout(
    client: Arc<dyn SecretManagerClient>,
    project_id: &str,
    secret_name: &str,
    timeout: Duration,
) -> Option<String> {
    let (tx, rx) = mpsc::channel();
    let project = project_id.to_string();
    let name = secret_name.to_string();

    let spawned = thread::Builder::new()
        .name("secret-manager-fetch".to_string())
        .spawn(move || {
            let _ = tx.send(client.access_secret(&project, &name));
        });

    if let Err(e) = spawned {
        tracing::debug!("Could not spawn Secret Manager fetch thread: {}", e);
        return None;
    }

    match rx.recv_timeout(timeout) {
        Ok(value) => value,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(
                "Secret Manager fetch for '{}' timed out after {:?}",
                secret_name, timeout
            );
            None
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::debug!("Secret Manager fetch thread for '{}' exited without a result", secret_name);
            None
        }
    }
}

#[derive(Deserialize)]
struct AccessSecretResponse {
    payload: Option<SecretPayload>,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: Option<String>,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Secret Manager REST client
///
/// Authenticates with `GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise asks
/// the metadata server for the runtime service account's token.
pub struct GcpSecretManagerClient {
    http: reqwest::blocking::Client,
    static_token: Option<String>,
}

impl GcpSecretManagerClient {
    pub fn new(timeout: Duration, static_token: Option<String>) -> Result<Self, SecretError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent("netra-config")
            .build()
            .map_err(|e| SecretError::Client(e.to_string()))?;

        Ok(Self { http, static_token })
    }

    /// Build a client configured from the environment
    pub fn from_env(env: &dyn EnvironmentProvider) -> Result<Self, SecretError> {
        Self::new(timeout_from_env(env), env.get_trimmed("GOOGLE_OAUTH_ACCESS_TOKEN"))
    }

    fn access_token(&self) -> Option<String> {
        if let Some(token) = &self.static_token {
            return Some(token.clone());
        }

        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .map_err(|e| tracing::debug!("Metadata server token request failed: {}", e))
            .ok()?;

        if !response.status().is_success() {
            tracing::debug!("Metadata server returned status: {}", response.status());
            return None;
        }

        response
            .json::<MetadataToken>()
            .map(|token| token.access_token)
            .map_err(|e| tracing::debug!("Metadata token response was not understood: {}", e))
            .ok()
    }
}

impl SecretManagerClient for GcpSecretManagerClient {
    fn is_available(&self) -> bool {
        self.access_token().is_some()
    }

    fn access_secret(&self, project_id: &str, secret_name: &str) -> Option<String> {
        let token = self.access_token()?;
        let url = format!(
            "{}/projects/{}/secrets/{}/versions/latest:access",
            SECRET_MANAGER_API, project_id, secret_name
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .map_err(|e| tracing::debug!("Secret Manager request for '{}' failed: {}", secret_name, e))
            .ok()?;

        if !response.status().is_success() {
            tracing::debug!(
                "Secret Manager returned status {} for '{}'",
                response.status(),
                secret_name
            );
            return None;
        }

        let body = response
            .json::<AccessSecretResponse>()
            .map_err(|e| tracing::debug!("Secret Manager response for '{}' was not understood: {}", secret_name, e))
            .ok()?;

        decode_payload(body.payload?.data?.as_str())
    }
}

/// Decode a base64 Secret Manager payload as UTF-8 and strip it
fn decode_payload(data: &str) -> Option<String> {
    let bytes = BASE64
        .decode(data)
        .map_err(|e| tracing::debug!("Secret payload is not valid base64: {}", e))
        .ok()?;
    let text = String::from_utf8(bytes)
        .map_err(|e| tracing::debug!("Secret payload is not valid UTF-8: {}", e))
        .ok()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Instant;

    struct SlowClient;

    impl SecretManagerClient for SlowClient {
        fn is_available(&self) -> bool {
            true
        }

        fn access_secret(&self, _project_id: &str, _secret_name: &str) -> Option<String> {
            thread::sleep(Duration::from_secs(3));
            Some("too-late".to_string())
        }
    }

    struct FixedClient(&'static str);

    impl SecretManagerClient for FixedClient {
        fn is_available(&self) -> bool {
            true
        }

        fn access_secret(&self, _project_id: &str, _secret_name: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_decode_payload_strips_whitespace() {
        let encoded = BASE64.encode("  my-secret-value\n");
        assert_eq!(decode_payload(&encoded), Some("my-secret-value".to_string()));
    }

    #[test]
    fn test_decode_payload_rejects_garbage() {
        assert_eq!(decode_payload("!!!not-base64!!!"), None);
        assert_eq!(decode_payload(&BASE64.encode("   ")), None);
        assert_eq!(decode_payload(&BASE64.encode([0xff, 0xfe, 0xfd])), None);
    }

    #[test]
    fn test_resolve_project_id_order() {
        let vars = HashMap::from([
            ("GOOGLE_CLOUD_PROJECT".to_string(), "from-google".to_string()),
            ("GCP_PROJECT".to_string(), "from-legacy".to_string()),
        ]);
        assert_eq!(resolve_project_id(&vars), Some("from-google".to_string()));
        assert_eq!(resolve_project_id(&HashMap::<String, String>::new()), None);
    }

    #[test]
    fn test_timeout_from_env() {
        let vars = HashMap::from([("SECRET_MANAGER_TIMEOUT_SECONDS".to_string(), "2".to_string())]);
        assert_eq!(timeout_from_env(&vars), Duration::from_secs(2));

        let bad = HashMap::from([("SECRET_MANAGER_TIMEOUT_SECONDS".to_string(), "0".to_string())]);
        assert_eq!(timeout_from_env(&bad), DEFAULT_SECRET_MANAGER_TIMEOUT);
    }

    #[test]
    fn test_access_with_timeout_gives_up_on_hung_client() {
        let started = Instant::now();
        let result = access_with_timeout(Arc::new(SlowClient), "proj", "secret", Duration::from_millis(100));

        assert_eq!(result, None);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_access_with_timeout_returns_value() {
        let result = access_with_timeout(
            Arc::new(FixedClient("cloud-value")),
            "proj",
            "secret",
            Duration::from_secs(1),
        );
        assert_eq!(result, Some("cloud-value".to_string()));
    }
}
