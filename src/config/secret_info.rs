use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Environment;
use crate::config::masking::mask_secret;

/// Where a resolved secret came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecretSource {
    EnvironmentVariable,
    GcpSecretManager,
    DevelopmentFallback,
    EmergencyGenerated,
    ConfigurationFile,
}

impl SecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnvironmentVariable => "environment_variable",
            Self::GcpSecretManager => "gcp_secret_manager",
            Self::DevelopmentFallback => "development_fallback",
            Self::EmergencyGenerated => "emergency_generated",
            Self::ConfigurationFile => "configuration_file",
        }
    }
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved secret and its provenance
///
/// Fields are private so `length` can never drift from the value; a
/// `SecretInfo` is never mutated once built, the `with_*` methods consume
/// and return a new one.
#[derive(Clone)]
pub struct SecretInfo {
    value: String,
    source: SecretSource,
    length: usize,
    environment: Environment,
    is_fallback: bool,
    is_generated: bool,
    validation_notes: Vec<String>,
    resolved_at: DateTime<Utc>,
}

impl SecretInfo {
    pub fn new(value: impl Into<String>, source: SecretSource, environment: Environment) -> Self {
        let value = value.into();
        let length = value.chars().count();
        Self {
            value,
            source,
            length,
            environment,
            is_fallback: false,
            is_generated: false,
            validation_notes: Vec::new(),
            resolved_at: Utc::now(),
        }
    }

    pub fn with_fallback(mut self, is_fallback: bool) -> Self {
        self.is_fallback = is_fallback;
        self
    }

    pub fn with_generated(mut self, is_generated: bool) -> Self {
        self.is_generated = is_generated;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.validation_notes.push(note.into());
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_value(self) -> String {
        self.value
    }

    pub fn source(&self) -> SecretSource {
        self.source
    }

    /// Length in characters; always equal to the value's length
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    pub fn is_generated(&self) -> bool {
        self.is_generated
    }

    pub fn validation_notes(&self) -> &[String] {
        &self.validation_notes
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }
}

impl fmt::Debug for SecretInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretInfo")
            .field("value", &mask_secret(&self.value))
            .field("source", &self.source)
            .field("length", &self.length)
            .field("environment", &self.environment)
            .field("is_fallback", &self.is_fallback)
            .field("is_generated", &self.is_generated)
            .field("validation_notes", &self.validation_notes)
            .finish()
    }
}
