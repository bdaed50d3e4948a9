/// Trait for providing environment variable access
///
/// Everything that reads configuration goes through this abstraction so the
/// same resolution code can run against the real process environment, an
/// isolated per-test mapping, or a builder's frozen snapshot.
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;

    /// Get a variable with surrounding whitespace removed, treating blank
    /// values as absent
    fn get_trimmed(&self, key: &str) -> Option<String> {
        self.get_var(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Returns the first non-blank value among `keys`, with the key it came from
    fn first_of(&self, keys: &[&str]) -> Option<(String, String)> {
        keys.iter().find_map(|key| {
            self.get_trimmed(key)
                .map(|value| ((*key).to_string(), value))
        })
    }
}

/// Environment provider that reads from the process environment
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvironmentProvider for std::collections::HashMap<String, String> {
    fn get_var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
