//! The capability set every application plugin implements.
//!
//! Capabilities return `anyhow::Result` and are never called directly by the farm; they
//! go through [`PluginHost`](crate::host::PluginHost), which turns errors and panics into
//! error log entries and default values.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use farm_core::config::{ConfigEntry, CATEGORY_INFORMATION, KEY_PROGRAM_VERSION};
use farm_core::{JobDescription, PluginDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::outcome::JobOutcome;
use crate::worker::WorkerContext;

/// Process a plugin is loaded into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Executable of the running process.
    pub executable: PathBuf,
    /// Name of the host application's main window, when one is present.
    pub host_window: Option<String>,
}

impl HostEnvironment {
    /// Environment of the current process, without a host window.
    pub fn current() -> Self {
        Self {
            executable: std::env::current_exe().unwrap_or_default(),
            host_window: None,
        }
    }

    pub fn executable_name(&self) -> Option<&str> {
        self.executable.file_name().and_then(|n| n.to_str())
    }
}

/// State of the submitter a capability is called from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionContext {
    /// Scene open in the host application.
    pub current_file: Option<PathBuf>,
    /// Files the submitter already collected for the job.
    pub scene_files: Vec<PathBuf>,
}

/// Render settings a plugin may change for the duration of a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
}

/// Per-application adapter.
///
/// Only [`descriptor`](Self::descriptor), [`startup`](Self::startup) and
/// [`start_job`](Self::start_job) are required; the scene queries default to the answers
/// of an application without a scene graph.
#[async_trait]
pub trait AppPlugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    /// Whether the plugin applies to the process it was loaded into.
    async fn startup(&self, host: &HostEnvironment) -> anyhow::Result<bool>;

    async fn current_file_name(&self, _ctx: &SubmissionContext, path: &Path) -> anyhow::Result<PathBuf> {
        Ok(path.to_path_buf())
    }

    async fn save_scene(&self, _ctx: &SubmissionContext, _path: &Path) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn frame_range(&self, _ctx: &SubmissionContext) -> anyhow::Result<FrameRange> {
        Ok(FrameRange::default())
    }

    async fn scene_cameras(&self, _ctx: &SubmissionContext) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn camera_name(&self, _ctx: &SubmissionContext, _handle: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }

    async fn external_files(
        &self,
        _ctx: &SubmissionContext,
        _is_submitting: bool,
    ) -> anyhow::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    async fn current_scene_files(&self, ctx: &SubmissionContext) -> anyhow::Result<Vec<PathBuf>> {
        Ok(ctx.scene_files.clone())
    }

    /// Adjust render state before a submission. Paired with
    /// [`undo_render_settings`](Self::undo_render_settings).
    async fn pre_submit(
        &self,
        _ctx: &SubmissionContext,
        _settings: &mut RenderSettings,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn undo_render_settings(
        &self,
        _ctx: &SubmissionContext,
        _settings: &RenderSettings,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// An error blocks the submission.
    async fn pre_submit_checks(
        &self,
        _ctx: &SubmissionContext,
        _job: &JobDescription,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Add plugin keys to the job config. Running it twice leaves one `programVersion`.
    async fn job_config_params(
        &self,
        _ctx: &SubmissionContext,
        entries: &mut Vec<ConfigEntry>,
    ) -> anyhow::Result<()> {
        append_program_version(entries, &self.descriptor().default_program_version);
        Ok(())
    }

    async fn start_job(
        &self,
        worker: &dyn WorkerContext,
        job: &JobDescription,
    ) -> anyhow::Result<JobOutcome>;

    /// Copy sidecar files sharing the scene's stem next to `target`.
    async fn copy_scene_file(&self, orig: &Path, target: &Path) -> anyhow::Result<()> {
        copy_sidecar_files(orig, target, &self.descriptor().sidecar_formats)?;
        Ok(())
    }

    async fn integration_add(&self, _host: &HostEnvironment) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn integration_remove(
        &self,
        _host: &HostEnvironment,
        _install_path: &Path,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Default executable of the application, if installed.
    async fn executable(&self) -> anyhow::Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Installation directory for `version` (the newest when `None`).
    async fn install_path(&self, _version: Option<&str>) -> anyhow::Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Appends `["information", "programVersion", default]` unless a `programVersion` entry exists.
pub fn append_program_version(entries: &mut Vec<ConfigEntry>, default: &str) {
    if entries.iter().any(|e| e.key() == KEY_PROGRAM_VERSION) {
        return;
    }
    entries.push(ConfigEntry::new(
        CATEGORY_INFORMATION,
        KEY_PROGRAM_VERSION,
        default.to_string(),
    ));
}

/// Copies files next to `orig` whose stem matches it and whose extension is listed in
/// `formats` into the directory of `target`. Returns the copied destinations.
pub fn copy_sidecar_files(
    orig: &Path,
    target: &Path,
    formats: &[String],
) -> std::io::Result<Vec<PathBuf>> {
    let (Some(src_dir), Some(dst_dir), Some(stem)) =
        (orig.parent(), target.parent(), orig.file_stem())
    else {
        return Ok(Vec::new());
    };
    let stem = stem.to_string_lossy();

    let mut copied = Vec::new();
    for entry in std::fs::read_dir(src_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        if !name.starts_with(stem.as_ref()) || !formats.iter().any(|f| *f == extension) {
            continue;
        }

        let destination = dst_dir.join(&name);
        if destination == path {
            continue;
        }
        debug!(from = %path.display(), to = %destination.display(), "copying sidecar file");
        std::fs::copy(&path, &destination)?;
        copied.push(destination);
    }
    Ok(copied)
}
