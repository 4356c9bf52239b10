//! Client-side submission: form validation, last-used settings and the submit contract.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{
    ConfigEntry, ConfigStore, CATEGORY_GLOBALS, CATEGORY_INFORMATION, CATEGORY_LAST_USED,
    KEY_LOCAL_MODE, KEY_PROGRAM_VERSION,
};
use crate::domain::JobDescription;
use crate::error::{ConfigError, SubmitError};

/// Environment variable overriding the submission spool directory.
pub const SPOOL_ENV: &str = "FARM_SPOOL";

/// Values a user enters when submitting a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionForm {
    pub project_name: String,
    pub job_name: String,
    pub priority: i64,
    pub frames_per_task: i64,
    pub task_timeout: u64,
    pub concurrent_tasks: i64,
    pub suspended: bool,
    pub dependent_files: bool,
    pub upload_output: bool,
    /// File the job runs. Must be absolute and carry an extension.
    pub scene_file: PathBuf,
    /// Defaults to the scene file when empty.
    pub output_path: Option<PathBuf>,
    pub program_version: Option<String>,
}

impl Default for SubmissionForm {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            job_name: String::new(),
            priority: 50,
            frames_per_task: 1,
            task_timeout: 180,
            concurrent_tasks: 1,
            suspended: false,
            dependent_files: false,
            upload_output: true,
            scene_file: PathBuf::new(),
            output_path: None,
            program_version: None,
        }
    }
}

impl SubmissionForm {
    /// Checks performed before anything is sent to the farm.
    pub fn validate(&self) -> Result<(), SubmitError> {
        if !is_complete_filename(&self.scene_file) {
            return Err(SubmitError::InvalidPath {
                path: self.scene_file.clone(),
            });
        }
        if self.job_name.trim().is_empty() {
            return Err(SubmitError::EmptyJobName);
        }
        Ok(())
    }

    pub fn to_job_description(&self) -> JobDescription {
        JobDescription {
            job_name: self.job_name.clone(),
            project_name: self.project_name.clone(),
            priority: self.priority,
            frames_per_task: self.frames_per_task,
            timeout: self.task_timeout,
            concurrent_tasks: self.concurrent_tasks,
            suspended: self.suspended,
            submit_dependent_files: self.dependent_files,
            upload_output: self.upload_output,
            scene_file: self.scene_file.clone(),
            output_path: Some(
                self.output_path
                    .clone()
                    .unwrap_or_else(|| self.scene_file.clone()),
            ),
            start_frame: 0,
            end_frame: 0,
            program_version: self.program_version.clone(),
            job_code: None,
        }
    }
}

/// Absolute path with a non-empty extension.
pub fn is_complete_filename(path: &Path) -> bool {
    path.is_absolute()
        && path
            .extension()
            .map(|ext| !ext.is_empty())
            .unwrap_or(false)
}

/// Settings remembered between submissions. `None` means "not stored".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastUsedSettings {
    pub project_name: Option<String>,
    pub priority: Option<i64>,
    pub frames_per_task: Option<i64>,
    pub task_timeout: Option<u64>,
    pub concurrent_tasks: Option<i64>,
    pub suspended: Option<bool>,
    pub dependent_files: Option<bool>,
    pub upload_output: Option<bool>,
    pub local_mode: bool,
}

impl LastUsedSettings {
    /// Reads `lastUsedSettings.*` and `globals.localMode`. Values of the wrong type are skipped.
    pub fn load(store: &dyn ConfigStore) -> Result<Self, ConfigError> {
        let local_mode = store
            .get_bool(CATEGORY_GLOBALS, KEY_LOCAL_MODE)?
            .unwrap_or(false);
        let upload_output = if local_mode {
            // Nothing is uploaded in local mode.
            Some(false)
        } else {
            store.get_bool(CATEGORY_LAST_USED, "uploadOutput")?
        };

        Ok(Self {
            project_name: store.get_string(CATEGORY_LAST_USED, "projectName")?,
            priority: store.get_i64(CATEGORY_LAST_USED, "priority")?,
            frames_per_task: store.get_i64(CATEGORY_LAST_USED, "framesPerTask")?,
            task_timeout: store
                .get_i64(CATEGORY_LAST_USED, "taskTimeout")?
                .and_then(|t| u64::try_from(t).ok()),
            concurrent_tasks: store.get_i64(CATEGORY_LAST_USED, "concurrentTasks")?,
            suspended: store.get_bool(CATEGORY_LAST_USED, "suspended")?,
            dependent_files: store.get_bool(CATEGORY_LAST_USED, "dependentFiles")?,
            upload_output,
            local_mode,
        })
    }

    /// Captures the persisted subset of a form.
    pub fn from_form(form: &SubmissionForm) -> Self {
        Self {
            project_name: Some(form.project_name.clone()),
            priority: Some(form.priority),
            frames_per_task: Some(form.frames_per_task),
            task_timeout: Some(form.task_timeout),
            concurrent_tasks: Some(form.concurrent_tasks),
            suspended: Some(form.suspended),
            dependent_files: Some(form.dependent_files),
            upload_output: Some(form.upload_output),
            local_mode: false,
        }
    }

    pub fn save(&self, store: &dyn ConfigStore) -> Result<(), ConfigError> {
        let mut entries = Vec::new();
        let mut push = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                entries.push(ConfigEntry::new(CATEGORY_LAST_USED, key, value));
            }
        };
        push("projectName", self.project_name.clone().map(Value::from));
        push("priority", self.priority.map(Value::from));
        push("framesPerTask", self.frames_per_task.map(Value::from));
        push("taskTimeout", self.task_timeout.map(Value::from));
        push("concurrentTasks", self.concurrent_tasks.map(Value::from));
        push("suspended", self.suspended.map(Value::from));
        push("dependentFiles", self.dependent_files.map(Value::from));
        push("uploadOutput", self.upload_output.map(Value::from));
        store.set_many(&entries)
    }

    /// Fills form fields from the stored values.
    pub fn apply_to(&self, form: &mut SubmissionForm) {
        if let Some(v) = &self.project_name {
            form.project_name = v.clone();
        }
        if let Some(v) = self.priority {
            form.priority = v;
        }
        if let Some(v) = self.frames_per_task {
            form.frames_per_task = v;
        }
        if let Some(v) = self.task_timeout {
            form.task_timeout = v;
        }
        if let Some(v) = self.concurrent_tasks {
            form.concurrent_tasks = v;
        }
        if let Some(v) = self.suspended {
            form.suspended = v;
        }
        if let Some(v) = self.dependent_files {
            form.dependent_files = v;
        }
        if let Some(v) = self.upload_output {
            form.upload_output = v;
        }
    }
}

/// Job configuration list handed to plugins before the job is queued.
pub fn job_config_entries(job: &JobDescription) -> Vec<ConfigEntry> {
    let mut entries = vec![
        ConfigEntry::new(CATEGORY_INFORMATION, "jobName", job.job_name.clone()),
        ConfigEntry::new(CATEGORY_INFORMATION, "projectName", job.project_name.clone()),
        ConfigEntry::new(CATEGORY_INFORMATION, "priority", job.priority),
        ConfigEntry::new(CATEGORY_INFORMATION, "framesPerTask", job.frames_per_task),
        ConfigEntry::new(CATEGORY_INFORMATION, "taskTimeout", job.timeout),
        ConfigEntry::new(CATEGORY_INFORMATION, "concurrentTasks", job.concurrent_tasks),
        ConfigEntry::new(
            CATEGORY_INFORMATION,
            "scenefile",
            job.scene_file.to_string_lossy().into_owned(),
        ),
    ];
    if let Some(version) = &job.program_version {
        entries.push(ConfigEntry::new(
            CATEGORY_INFORMATION,
            KEY_PROGRAM_VERSION,
            version.clone(),
        ));
    }
    entries
}

/// Outcome of handing a job to the farm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Success {
        job_code: String,
        /// Output location to reveal in a file browser.
        output_path: PathBuf,
        /// Where the submitter queued its copy of the scene file, if it made one.
        queued_scene: Option<PathBuf>,
    },
    /// Explicit cancellation with a message for the user.
    Canceled(String),
    Failed(String),
}

impl SubmitResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitResult::Success { .. })
    }
}

/// Entry point that queues a job with the farm.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit_job(&self, job: &JobDescription, job_config: &[ConfigEntry]) -> SubmitResult;
}

/// Queues jobs as `<spool>/<jobcode>/job.json` plus a copy of the scene file.
#[derive(Debug, Clone)]
pub struct SpoolSubmitter {
    root: PathBuf,
}

impl SpoolSubmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$FARM_SPOOL`, else `<data dir>/farmhand/Submissions`.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(SPOOL_ENV) {
            return Ok(Self::new(path));
        }
        dirs::data_dir()
            .map(|dir| Self::new(dir.join("farmhand").join("Submissions")))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_job(
        &self,
        job: &JobDescription,
        job_config: &[ConfigEntry],
        job_code: &str,
    ) -> std::io::Result<(PathBuf, Option<PathBuf>)> {
        let job_dir = self.root.join(job_code);
        let scene_dir = job_dir.join("scenefiles");
        std::fs::create_dir_all(&scene_dir)?;

        let mut queued = job.clone();
        queued.job_code = Some(job_code.to_string());
        if queued.program_version.is_none() {
            queued.program_version = job_config
                .iter()
                .find(|e| e.key() == KEY_PROGRAM_VERSION)
                .and_then(|e| e.value().as_str().map(str::to_string));
        }
        let queued_scene = match job.scene_file.file_name() {
            Some(name) => {
                let target = scene_dir.join(name);
                std::fs::copy(&job.scene_file, &target)?;
                Some(target)
            }
            None => None,
        };

        let job_json = serde_json::to_string_pretty(&queued).map_err(std::io::Error::other)?;
        std::fs::write(job_dir.join("job.json"), job_json)?;
        let config_json =
            serde_json::to_string_pretty(job_config).map_err(std::io::Error::other)?;
        std::fs::write(job_dir.join("config.json"), config_json)?;
        Ok((job_dir, queued_scene))
    }
}

#[async_trait]
impl JobSubmitter for SpoolSubmitter {
    async fn submit_job(&self, job: &JobDescription, job_config: &[ConfigEntry]) -> SubmitResult {
        if !job.scene_file.exists() {
            return SubmitResult::Canceled(format!(
                "Submission canceled: scene file {} does not exist",
                job.scene_file.display()
            ));
        }

        let job_code = Uuid::new_v4().simple().to_string();
        match self.write_job(job, job_config, &job_code) {
            Ok((job_dir, queued_scene)) => {
                info!(job_code = %job_code, dir = %job_dir.display(), "job spooled");
                let output_path = job
                    .output_path
                    .clone()
                    .unwrap_or_else(|| job.scene_file.clone());
                SubmitResult::Success {
                    job_code,
                    output_path,
                    queued_scene,
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to spool job");
                SubmitResult::Failed(format!("could not write job to spool: {e}"))
            }
        }
    }
}
