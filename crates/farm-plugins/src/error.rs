//! Error types for farm-plugins

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or configuring a plugin
#[derive(Error, Debug)]
pub enum PluginError {
    /// Installation discovery could not be set up
    #[error("resolver error: {0}")]
    Resolve(#[from] install_resolver::ResolveError),

    /// Config store error
    #[error("config error: {0}")]
    Config(#[from] farm_core::ConfigError),

    /// No plugin registered under this name
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a job was not started.
///
/// The display text is what the worker writes into the job log.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no {app} installation found")]
    NoInstallation { app: String },

    #[error("no outputpath specified")]
    NoOutputPath,

    #[error("no jobcode assigned, cannot place distributed output")]
    NoJobCode,

    #[error("scenefile does not exist: {}", path.display())]
    SceneFileMissing { path: PathBuf },

    #[error("could not create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start render process: {0}")]
    Launch(String),
}

/// Result type for plugin setup operations
pub type Result<T> = std::result::Result<T, PluginError>;
