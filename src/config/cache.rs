use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::{Environment, SecretInfo};

/// Process-lifetime cache of resolved secrets keyed by `(name, environment)`
///
/// The environment is part of the key so switching environment inside one
/// process never serves a secret resolved for another one.
#[derive(Default)]
pub struct SecretCache {
    entries: Mutex<HashMap<(String, Environment), SecretInfo>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, Environment), SecretInfo>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str, environment: Environment) -> Option<SecretInfo> {
        self.lock()
            .get(&(name.to_string(), environment))
            .filter(|info| is_servable(info))
            .cloned()
    }

    /// Cached entry only if it satisfies `min_length`
    pub fn get_valid(&self, name: &str, environment: Environment, min_length: usize) -> Option<SecretInfo> {
        self.get(name, environment)
            .filter(|info| info.length() >= min_length)
    }

    /// Store `info`; generated production secrets are refused
    pub fn cache_secret(&self, name: &str, info: SecretInfo) -> bool {
        if !is_servable(&info) {
            tracing::error!(secret = name, "refusing to cache a generated secret for production");
            return false;
        }
        let environment = info.environment();
        self.lock().insert((name.to_string(), environment), info);
        true
    }

    /// Insert `info` unless another thread cached this key first; returns
    /// whichever entry ends up stored. A generated production secret is
    /// returned as-is and never stored.
    pub fn get_or_insert(&self, name: &str, info: SecretInfo) -> SecretInfo {
        if !is_servable(&info) {
            tracing::error!(secret = name, "refusing to cache a generated secret for production");
            return info;
        }
        let key = (name.to_string(), info.environment());
        self.lock().entry(key).or_insert(info).clone()
    }

    pub fn invalidate(&self, name: &str) {
        self.lock().retain(|(cached_name, _), _| cached_name != name);
    }

    pub fn clear(&self) {
        self.lock().clear();
        tracing::debug!("secret cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// Production must never see a generated value, cached or not
fn is_servable(info: &SecretInfo) -> bool {
    !(info.environment().is_production() && info.is_generated())
}

impl std::fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCache")
            .field("entries", &self.len())
            .finish()
    }
}
