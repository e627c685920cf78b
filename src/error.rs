//! Error types for the frequency control layer.

use thiserror::Error;

use crate::ratelimit::BackendError;

/// Main error type for frequency control operations.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required default is missing or unusable
    #[error("Configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    /// The counting backend could not be reached
    #[error("Counting backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for ControlError {
    fn from(err: ::config::ConfigError) -> Self {
        ControlError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for ControlError {
    fn from(err: serde_yaml::Error) -> Self {
        ControlError::Config(err.to_string())
    }
}

/// Result type alias for frequency control operations.
pub type Result<T> = std::result::Result<T, ControlError>;
