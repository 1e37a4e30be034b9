//! Typed errors for job configuration.

use thiserror::Error;

/// Errors raised by the typed accessors on [`crate::JobConfig`].
///
/// These surface as per-job failures at the runner boundary; they never
/// abort the overall run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required config key is absent from the composed job config.
    #[error("missing required config key: {key}")]
    MissingKey { key: String },

    /// The key is present but holds a value of the wrong type.
    #[error("config key '{key}' has the wrong type (expected {expected})")]
    InvalidValue { key: String, expected: &'static str },
}

impl ConfigError {
    pub fn missing(key: &str) -> Self {
        Self::MissingKey {
            key: key.to_string(),
        }
    }

    pub fn invalid(key: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            expected,
        }
    }
}
