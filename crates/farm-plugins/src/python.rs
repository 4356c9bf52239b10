//! Plugin for plain Python scripts rendered with a local interpreter.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use farm_core::{ConfigStore, JobDescription, Platform, PluginDescriptor, PluginType};
use install_resolver::{platform_default, InstallationResolver};
use tracing::debug;

use crate::dispatch::JobDispatcher;
use crate::error::Result;
use crate::outcome::JobOutcome;
use crate::plugin::{AppPlugin, HostEnvironment};
use crate::worker::WorkerContext;

pub fn python_descriptor() -> PluginDescriptor {
    PluginDescriptor {
        version: "v0.0.0.1".to_string(),
        plugin_name: "Python".to_string(),
        plugin_type: PluginType::App,
        app_short_name: "Python".to_string(),
        app_type: "3d".to_string(),
        has_qt_parent: true,
        scene_formats: vec![".py".to_string()],
        app_specific_formats: vec![".py".to_string()],
        sidecar_formats: vec![".xgen".to_string(), ".abc".to_string()],
        app_color: [44, 121, 207],
        platforms: BTreeSet::from([Platform::Windows]),
        executable_name: "python.exe".to_string(),
        frame_string: String::new(),
        program_tag: "python".to_string(),
        default_program_version: "2.7".to_string(),
    }
}

/// Runs a job's `.py` scene with the matching Python installation.
pub struct PythonPlugin {
    descriptor: PluginDescriptor,
    config: Arc<dyn ConfigStore>,
    resolver: InstallationResolver,
}

impl PythonPlugin {
    /// Plugin using the platform's installation discovery.
    pub fn new(config: Arc<dyn ConfigStore>) -> Result<Self> {
        let descriptor = python_descriptor();
        let discovery = platform_default(config.as_ref(), &descriptor.app_short_name)?;
        let resolver = InstallationResolver::new(descriptor.app_short_name.clone(), discovery);
        Ok(Self::with_resolver(config, resolver))
    }

    pub fn with_resolver(config: Arc<dyn ConfigStore>, resolver: InstallationResolver) -> Self {
        Self {
            descriptor: python_descriptor(),
            config,
            resolver,
        }
    }

    pub fn resolver(&self) -> &InstallationResolver {
        &self.resolver
    }

    fn dispatcher(&self) -> JobDispatcher<'_> {
        JobDispatcher::new(&self.descriptor, self.config.as_ref(), &self.resolver)
    }
}

#[async_trait]
impl AppPlugin for PythonPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn startup(&self, host: &HostEnvironment) -> anyhow::Result<bool> {
        let headless = host
            .executable_name()
            .is_some_and(|name| name.eq_ignore_ascii_case(&self.descriptor.executable_name));
        if headless {
            debug!("running inside a standalone interpreter");
            return Ok(true);
        }
        Ok(host.host_window.is_some())
    }

    async fn start_job(
        &self,
        worker: &dyn WorkerContext,
        job: &JobDescription,
    ) -> anyhow::Result<JobOutcome> {
        Ok(self.dispatcher().start_job(worker, job).await)
    }

    async fn executable(&self) -> anyhow::Result<Option<PathBuf>> {
        Ok(self
            .resolver
            .resolve(None)
            .map(|dir| dir.join(&self.descriptor.executable_name))
            .filter(|path| path.exists()))
    }

    async fn install_path(&self, version: Option<&str>) -> anyhow::Result<Option<PathBuf>> {
        Ok(self.resolver.resolve(version))
    }
}
