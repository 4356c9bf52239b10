//! Turns a job description into a running render process on this node.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use farm_core::config::{ConfigStore, CATEGORY_OVERRIDES};
use farm_core::{JobDescription, PluginDescriptor, Severity};
use install_resolver::InstallationResolver;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::outcome::JobOutcome;
use crate::worker::WorkerContext;

/// Output directory for a job.
///
/// Local mode renders next to the requested output. Distributed mode renders into
/// `<slave_path>/RenderOutput/<job_code>/<name of the output's parent dir>`, which is
/// uploaded separately.
pub fn output_directory(
    output_path: &Path,
    local_mode: bool,
    slave_path: &Path,
    job_code: Option<&str>,
) -> Result<PathBuf, DispatchError> {
    let parent = output_path.parent().unwrap_or_else(|| Path::new(""));
    if local_mode {
        return Ok(parent.to_path_buf());
    }

    let job_code = job_code.ok_or(DispatchError::NoJobCode)?;
    let mut dir = slave_path.join("RenderOutput").join(job_code);
    if let Some(name) = parent.file_name() {
        dir.push(name);
    }
    Ok(dir)
}

/// Dispatch steps shared by application plugins that run `[interpreter, scene]`.
pub struct JobDispatcher<'a> {
    descriptor: &'a PluginDescriptor,
    config: &'a dyn ConfigStore,
    resolver: &'a InstallationResolver,
}

impl<'a> JobDispatcher<'a> {
    pub fn new(
        descriptor: &'a PluginDescriptor,
        config: &'a dyn ConfigStore,
        resolver: &'a InstallationResolver,
    ) -> Self {
        Self {
            descriptor,
            config,
            resolver,
        }
    }

    /// Admin override from `dccoverrides`, if enabled and present on disk.
    fn override_path(&self) -> Option<PathBuf> {
        let enabled = self
            .config
            .get_bool(CATEGORY_OVERRIDES, &self.descriptor.override_key())
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not read override setting");
                None
            })
            .unwrap_or(false);
        if !enabled {
            return None;
        }

        let path = self
            .config
            .get_string(CATEGORY_OVERRIDES, &self.descriptor.override_path_key())
            .ok()
            .flatten()
            .map(PathBuf::from)?;
        if path.exists() {
            Some(path)
        } else {
            debug!(path = %path.display(), "override enabled but path does not exist");
            None
        }
    }

    /// Interpreter for `job`: the override verbatim, else the resolved installation
    /// joined with the descriptor's executable name.
    pub fn interpreter_path(&self, job: &JobDescription) -> Option<PathBuf> {
        if let Some(path) = self.override_path() {
            return Some(path);
        }
        self.resolver
            .resolve(job.program_version.as_deref())
            .map(|dir| dir.join(&self.descriptor.executable_name))
    }

    fn give_up(
        &self,
        worker: &dyn WorkerContext,
        job: &JobDescription,
        severity: Severity,
        reason: DispatchError,
    ) -> DispatchError {
        worker.write_log(&reason.to_string(), severity);
        worker.rendering_failed(job);
        reason
    }

    /// Run the ordered checks and launch the render process.
    ///
    /// Every non-started outcome has already been reported through
    /// `rendering_failed`, exactly once.
    pub async fn start_job(&self, worker: &dyn WorkerContext, job: &JobDescription) -> JobOutcome {
        let app = &self.descriptor.plugin_name;
        worker.write_log(&format!("starting {app} job. {}", job.job_name), Severity::Info);

        let interpreter = match self.interpreter_path(job) {
            Some(path) if path.exists() => path,
            _ => {
                let reason = DispatchError::NoInstallation { app: app.clone() };
                return JobOutcome::Skipped(self.give_up(worker, job, Severity::Error, reason));
            }
        };

        let Some(output_path) = job.output_path.as_deref() else {
            let reason = DispatchError::NoOutputPath;
            return JobOutcome::Failed(self.give_up(worker, job, Severity::Warning, reason));
        };

        let output_dir = match output_directory(
            output_path,
            worker.local_mode(),
            worker.local_slave_path(),
            job.job_code.as_deref(),
        ) {
            Ok(dir) => dir,
            Err(reason) => {
                return JobOutcome::Failed(self.give_up(worker, job, Severity::Warning, reason))
            }
        };

        // Checked before creating the directory so a bad job leaves nothing behind.
        if !job.scene_file.exists() {
            let reason = DispatchError::SceneFileMissing {
                path: job.scene_file.clone(),
            };
            return JobOutcome::Failed(self.give_up(worker, job, Severity::Warning, reason));
        }

        if let Err(source) = std::fs::create_dir_all(&output_dir) {
            let reason = DispatchError::OutputDirectory {
                path: output_dir,
                source,
            };
            return JobOutcome::Failed(self.give_up(worker, job, Severity::Warning, reason));
        }
        debug!(job = %job.label(), dir = %output_dir.display(), "output directory ready");

        let args = vec![
            OsString::from(interpreter.as_os_str()),
            OsString::from(job.scene_file.as_os_str()),
        ];
        match worker
            .start_render_thread(args, job, &self.descriptor.program_tag)
            .await
        {
            Ok(handle) => JobOutcome::Started(handle),
            Err(e) => {
                let reason = DispatchError::Launch(format!("{e:#}"));
                JobOutcome::Failed(self.give_up(worker, job, Severity::Error, reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_directory_local_mode() {
        let dir = output_directory(
            Path::new("/render/out/frame.####.png"),
            true,
            Path::new("/worker"),
            None,
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/render/out"));
    }

    #[test]
    fn test_output_directory_distributed() {
        let dir = output_directory(
            Path::new("/render/out/frame.####.png"),
            false,
            Path::new("/worker"),
            Some("J42"),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/worker/RenderOutput/J42/out"));
    }

    #[test]
    fn test_output_directory_distributed_needs_job_code() {
        let result = output_directory(
            Path::new("/render/out/frame.png"),
            false,
            Path::new("/worker"),
            None,
        );
        assert!(matches!(result, Err(DispatchError::NoJobCode)));
    }
}
