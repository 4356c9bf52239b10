//! Error types for install-resolver

use thiserror::Error;

/// Errors that can occur while resolving an installation
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Discovery found nothing
    #[error("no installations of {app} found")]
    NoInstallations { app: String },

    /// Nothing at or above the requested version
    #[error("no installation of {app} satisfies version {requested} (installed: {installed})")]
    NoMatchingVersion {
        app: String,
        requested: String,
        installed: String,
    },

    /// Requested version is not dotted-numeric
    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),

    /// Configured installation list is malformed
    #[error("invalid installation list for {app}: {reason}")]
    InvalidInstallList { app: String, reason: String },

    /// Directory scan pattern failed to compile
    #[error("invalid scan pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Config store error
    #[error("config error: {0}")]
    Config(#[from] farm_core::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
