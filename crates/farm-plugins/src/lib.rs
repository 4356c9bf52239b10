//! Farmhand Plugins: application adapters and job dispatch
//!
//! An [`AppPlugin`] translates a generic [`JobDescription`](farm_core::JobDescription)
//! into a render process on a worker node. The farm only talks to plugins through a
//! [`PluginHost`], which keeps plugin faults out of the worker.
//!
//! ## Dispatch
//!
//! [`JobDispatcher`] runs the ordered checks (interpreter, output path, scene file),
//! lays out the output directory and launches the process via the [`WorkerContext`].

use std::sync::Arc;

use farm_core::ConfigStore;

pub mod dispatch;
pub mod error;
pub mod host;
pub mod outcome;
pub mod plugin;
pub mod python;
pub mod submit;
pub mod worker;

pub use dispatch::{output_directory, JobDispatcher};
pub use error::{DispatchError, PluginError, Result};
pub use host::PluginHost;
pub use outcome::{JobOutcome, RenderExit, RenderHandle};
pub use plugin::{AppPlugin, FrameRange, HostEnvironment, RenderSettings, SubmissionContext};
pub use python::{python_descriptor, PythonPlugin};
pub use submit::submit;
pub use worker::{LocalWorker, WorkerContext};

/// Names of the plugins this crate ships.
pub const PLUGIN_NAMES: &[&str] = &["Python"];

/// Load a plugin by its `pluginName` (case-insensitive).
pub fn load_plugin(name: &str, config: Arc<dyn ConfigStore>) -> Result<Arc<dyn AppPlugin>> {
    match name.to_ascii_lowercase().as_str() {
        "python" => Ok(Arc::new(PythonPlugin::new(config)?)),
        _ => Err(PluginError::UnknownPlugin(name.to_string())),
    }
}
