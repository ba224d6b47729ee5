//! Error types for the keyrelay crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O error (reading the config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model not found in configuration.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Client construction or dispatch error.
    #[error("Client error: {0}")]
    Client(String),

    /// Logging could not be initialized or reconfigured.
    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
