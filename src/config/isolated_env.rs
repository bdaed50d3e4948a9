use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{EnvironmentProvider, SystemEnvironment};

/// Variables a child process needs to start at all, copied from the real
/// OS environment even while isolation is on
const SUBPROCESS_CRITICAL_VARS: &[&str] = &[
    "PATH", "HOME", "USER", "SHELL", "LANG", "TMPDIR", "TEMP", "TMP", "SYSTEMROOT",
];

static GLOBAL_ENV: OnceLock<Arc<IsolatedEnvironment>> = OnceLock::new();

#[derive(Default)]
struct EnvState {
    isolated: bool,
    /// Only consulted while `isolated` is set
    vars: HashMap<String, String>,
    sources: HashMap<String, String>,
}

/// Process-wide key/value store wrapping the OS environment
///
/// Outside isolation mode every read and write goes straight to the process
/// environment. With isolation enabled, reads and writes hit a private
/// mapping and nothing leaks into `std::env`. All access is serialized
/// through one `RwLock`, so concurrent writers never lose updates.
pub struct IsolatedEnvironment {
    state: RwLock<EnvState>,
}

impl IsolatedEnvironment {
    /// Create a store backed by the real process environment
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EnvState::default()),
        }
    }

    /// Create a store that starts in isolation mode holding exactly `vars`
    pub fn isolated<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let sources = vars
            .keys()
            .map(|k| (k.clone(), "isolated_init".to_string()))
            .collect();

        Self {
            state: RwLock::new(EnvState {
                isolated: true,
                vars,
                sources,
            }),
        }
    }

    /// Process-lifetime instance used when no explicit environment is injected
    pub fn global() -> Arc<IsolatedEnvironment> {
        GLOBAL_ENV
            .get_or_init(|| Arc::new(IsolatedEnvironment::new()))
            .clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, EnvState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EnvState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a variable; never fails, missing keys yield `None`
    pub fn get(&self, name: &str) -> Option<String> {
        let state = self.read();
        if state.isolated {
            state.vars.get(name).cloned()
        } else {
            SystemEnvironment.get_var(name)
        }
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Set a variable, recording where the value came from
    ///
    /// Returns `false` when the name or value cannot be represented in a
    /// process environment (empty name, `=` or NUL in the name, NUL in the
    /// value); nothing is written in that case.
    pub fn set(&self, name: &str, value: &str, source: &str) -> bool {
        if !is_valid_name(name) || value.contains('\0') {
            tracing::warn!("Refusing to set invalid environment variable '{}'", name);
            return false;
        }

        let mut state = self.write();
        if state.isolated {
            state.vars.insert(name.to_string(), value.to_string());
        } else {
            // SAFETY: the caller must ensure no other thread reads the process
            // environment while this runs. The lock only serializes access
            // made through this type; `SystemEnvironment`, DNS resolution and
            // other libraries read the environment without it.
            unsafe {
                std::env::set_var(name, value);
            }
        }
        state.sources.insert(name.to_string(), source.to_string());
        tracing::trace!(key = name, source, isolated = state.isolated, "environment variable set");
        true
    }

    /// Remove a variable; returns whether it was present
    pub fn delete(&self, name: &str) -> bool {
        if !is_valid_name(name) {
            return false;
        }

        let mut state = self.write();
        state.sources.remove(name);
        if state.isolated {
            state.vars.remove(name).is_some()
        } else {
            let existed = std::env::var_os(name).is_some();
            // SAFETY: see `set`.
            unsafe {
                std::env::remove_var(name);
            }
            existed
        }
    }

    /// Snapshot of every visible variable
    pub fn get_all(&self) -> HashMap<String, String> {
        let state = self.read();
        if state.isolated {
            state.vars.clone()
        } else {
            os_vars()
        }
    }

    pub fn get_source(&self, name: &str) -> Option<String> {
        self.read().sources.get(name).cloned()
    }

    pub fn is_isolated(&self) -> bool {
        self.read().isolated
    }

    /// Switch to isolation mode, seeding the private mapping with the
    /// current process environment. Already-isolated stores are untouched.
    pub fn enable_isolation(&self) {
        let mut state = self.write();
        if state.isolated {
            return;
        }
        state.vars = os_vars();
        state.isolated = true;
        tracing::debug!(vars = state.vars.len(), "environment isolation enabled");
    }

    /// Leave isolation mode, discarding every isolated write
    pub fn disable_isolation(&self) {
        let mut state = self.write();
        if !state.isolated {
            return;
        }
        state.isolated = false;
        state.vars.clear();
        state.sources.clear();
        tracing::debug!("environment isolation disabled");
    }

    /// Environment mapping to hand to a child process
    ///
    /// Contains every visible variable plus the critical system variables
    /// from the real OS environment, whatever the isolation state.
    pub fn get_subprocess_env(&self) -> HashMap<String, String> {
        let mut env = self.get_all();
        for name in SUBPROCESS_CRITICAL_VARS {
            if let Ok(value) = std::env::var(name) {
                env.entry((*name).to_string()).or_insert(value);
            }
        }
        env
    }

    /// Apply overrides until the returned guard is dropped
    ///
    /// A `None` value removes the variable for the duration of the scope.
    pub fn scoped_override(&self, vars: &[(&str, Option<&str>)]) -> ScopedOverride<'_> {
        let mut previous = Vec::with_capacity(vars.len());
        for (name, value) in vars {
            previous.push(((*name).to_string(), self.get(name), self.get_source(name)));
            match value {
                Some(value) => {
                    self.set(name, value, "scoped_override");
                }
                None => {
                    self.delete(name);
                }
            }
        }
        ScopedOverride { env: self, previous }
    }
}

impl Default for IsolatedEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentProvider for IsolatedEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.get(key)
    }
}

impl fmt::Debug for IsolatedEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("IsolatedEnvironment")
            .field("isolated", &state.isolated)
            .field("isolated_vars", &state.vars.len())
            .finish()
    }
}

/// Guard returned by [`IsolatedEnvironment::scoped_override`]
pub struct ScopedOverride<'a> {
    env: &'a IsolatedEnvironment,
    previous: Vec<(String, Option<String>, Option<String>)>,
}

impl Drop for ScopedOverride<'_> {
    fn drop(&mut self) {
        // Restore in reverse so a key overridden twice ends at its original value
        for (name, value, source) in self.previous.drain(..).rev() {
            match value {
                Some(value) => {
                    let source = source.unwrap_or_else(|| "restored".to_string());
                    self.env.set(&name, &value, &source);
                }
                None => {
                    self.env.delete(&name);
                }
            }
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('=') && !name.contains('\0')
}

fn os_vars() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
