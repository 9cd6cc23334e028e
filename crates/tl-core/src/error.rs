//! Configuration error types.
//!
//! Configuration problems are reported and logged but never abort an
//! authentication attempt on their own: the caller degrades to the
//! default value or to the conventional authentication path.

use thiserror::Error;

/// Errors raised while reading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The static configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The static configuration file is not valid TOML.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The preference store failed to answer.
    #[error("failed to get preference [{key}]: {message}")]
    Preference {
        /// Preference key that was requested.
        key: String,
        /// Backend error message.
        message: String,
    },

    /// A configured regular expression does not compile.
    #[error("invalid pattern in [{name}]: {message}")]
    InvalidPattern {
        /// Parameter name.
        name: String,
        /// Compiler error message.
        message: String,
    },

    /// A configured value has the wrong shape.
    #[error("invalid value for [{name}]: {value}")]
    InvalidValue {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: String,
    },
}

impl ConfigError {
    /// Creates a preference store error.
    #[must_use]
    pub fn preference(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Preference {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
