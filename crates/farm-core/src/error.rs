//! Error taxonomy for the Farmhand core.

use std::path::PathBuf;

/// Errors raised by configuration stores.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {path} is not a JSON object of categories")]
    Malformed { path: PathBuf },

    #[error("config category '{0}' is not an object")]
    CategoryNotObject(String),

    #[error("no config directory could be determined for this platform")]
    NoConfigDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while building or sending a submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The target file is relative or has no extension.
    #[error("Outputpath is invalid.\nPlease enter a complete filename.")]
    InvalidPath { path: PathBuf },

    #[error("job name must not be empty")]
    EmptyJobName,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Top-level Farmhand domain errors.
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    #[error("job description is invalid: {0}")]
    InvalidJob(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Farmhand core operations.
pub type Result<T> = std::result::Result<T, FarmError>;
