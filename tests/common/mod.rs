// Common test utilities for integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use netra_config::config::{ConfigContext, IsolatedEnvironment, SecretManagerClient};

/// Helper to manage environment variables in tests
///
/// Cleans up specified environment variables on creation and drop,
/// ensuring test isolation when dealing with global environment state.
pub struct EnvGuard {
    vars: Vec<String>,
}

impl EnvGuard {
    pub fn new(vars: Vec<&str>) -> Self {
        // Clean up before setting new values
        for var in &vars {
            unsafe {
                std::env::remove_var(var);
            }
        }
        Self {
            vars: vars.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Set one of the guarded variables
    pub fn set(&self, name: &str, value: &str) {
        assert!(self.vars.iter().any(|v| v == name), "{} is not guarded", name);
        unsafe {
            std::env::set_var(name, value);
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for var in &self.vars {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }
}

/// Global mutex for tests that modify environment variables
///
/// Environment variables are process-global, so tests that modify them
/// must run serially to avoid race conditions.
pub static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

/// Hermetic environment holding exactly `vars`
pub fn isolated(vars: &[(&str, &str)]) -> Arc<IsolatedEnvironment> {
    Arc::new(IsolatedEnvironment::isolated(vars.iter().copied()))
}

pub fn context(vars: &[(&str, &str)], client: Option<Arc<dyn SecretManagerClient>>) -> Arc<ConfigContext> {
    Arc::new(ConfigContext::new(isolated(vars), client))
}

/// In-memory Secret Manager double
///
/// Serves secrets by id, optionally after a delay, and counts calls.
pub struct FakeSecretManager {
    secrets: HashMap<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeSecretManager {
    pub fn new(secrets: &[(&str, &str)]) -> Self {
        Self {
            secrets: secrets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every access blocks for `delay` before answering
    pub fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecretManagerClient for FakeSecretManager {
    fn is_available(&self) -> bool {
        true
    }

    fn access_secret(&self, _project_id: &str, secret_name: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.secrets.get(secret_name).cloned()
    }
}
