//! Farmhand Core Library
//!
//! Domain types, configuration, fault logging and the submission client shared by the
//! render-farm plugins and the `farm` binary.

pub mod config;
pub mod domain;
pub mod error;
pub mod error_log;
pub mod submission;
pub mod telemetry;

pub use config::{ConfigEntry, ConfigStore, JsonConfigStore, MemoryConfigStore};
pub use domain::{JobDescription, Platform, PluginDescriptor, PluginType, Severity};
pub use error::{ConfigError, FarmError, Result, SubmitError};
pub use error_log::{ErrorLog, FaultReport, FileErrorLog, MemoryErrorLog};
pub use submission::{
    job_config_entries, JobSubmitter, LastUsedSettings, SpoolSubmitter, SubmissionForm,
    SubmitResult,
};
pub use telemetry::{init_tracing, job_span};

/// Farmhand version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
