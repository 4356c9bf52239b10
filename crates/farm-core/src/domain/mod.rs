//! Farmhand domain model.

pub mod job;
pub mod plugin;
pub mod severity;

pub use job::JobDescription;
pub use plugin::{Platform, PluginDescriptor, PluginType};
pub use severity::Severity;
