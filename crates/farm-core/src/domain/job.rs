//! Job description exchanged between the submitter, the farm core and worker plugins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FarmError, Result};

/// A render job as submitted to the farm.
///
/// Keys are camelCase on the wire. `scenefile` and `jobcode` keep the lowercase
/// spelling the worker side has always used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    #[serde(alias = "jobname")]
    pub job_name: String,

    #[serde(default)]
    pub project_name: String,

    #[serde(default)]
    pub priority: i64,

    #[serde(default = "default_frames_per_task")]
    pub frames_per_task: i64,

    /// Task timeout in seconds. Enforced by the worker, not the dispatcher.
    #[serde(default)]
    pub timeout: u64,

    #[serde(default = "default_concurrent_tasks")]
    pub concurrent_tasks: i64,

    #[serde(default)]
    pub suspended: bool,

    #[serde(default, alias = "submitDependendFiles")]
    pub submit_dependent_files: bool,

    #[serde(default)]
    pub upload_output: bool,

    #[serde(rename = "scenefile", alias = "filename")]
    pub scene_file: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    #[serde(default)]
    pub start_frame: i64,

    #[serde(default)]
    pub end_frame: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_version: Option<String>,

    /// Assigned by the scheduler when the job is queued.
    #[serde(rename = "jobcode", default, skip_serializing_if = "Option::is_none")]
    pub job_code: Option<String>,
}

fn default_frames_per_task() -> i64 {
    1
}

fn default_concurrent_tasks() -> i64 {
    1
}

impl JobDescription {
    /// Minimal job with farm defaults for every optional field.
    pub fn new(job_name: impl Into<String>, scene_file: impl Into<PathBuf>) -> Self {
        Self {
            job_name: job_name.into(),
            project_name: String::new(),
            priority: 50,
            frames_per_task: default_frames_per_task(),
            timeout: 180,
            concurrent_tasks: default_concurrent_tasks(),
            suspended: false,
            submit_dependent_files: false,
            upload_output: true,
            scene_file: scene_file.into(),
            output_path: None,
            start_frame: 0,
            end_frame: 0,
            program_version: None,
            job_code: None,
        }
    }

    pub fn with_output_path(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    pub fn with_job_code(mut self, job_code: impl Into<String>) -> Self {
        self.job_code = Some(job_code.into());
        self
    }

    pub fn with_program_version(mut self, version: impl Into<String>) -> Self {
        self.program_version = Some(version.into());
        self
    }

    /// Load a job description from a `job.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let job: Self = serde_json::from_str(&content)?;
        job.validate()?;
        Ok(job)
    }

    /// Structural checks that do not touch the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.job_name.trim().is_empty() {
            return Err(FarmError::InvalidJob("jobName is empty".to_string()));
        }
        if self.scene_file.as_os_str().is_empty() {
            return Err(FarmError::InvalidJob("scenefile is empty".to_string()));
        }
        if self.frames_per_task < 1 {
            return Err(FarmError::InvalidJob(format!(
                "framesPerTask must be positive, got {}",
                self.frames_per_task
            )));
        }
        Ok(())
    }

    /// Label used for log lines and spans.
    pub fn label(&self) -> &str {
        self.job_code.as_deref().unwrap_or(&self.job_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_worker_spelling() {
        let job: JobDescription = serde_json::from_value(json!({
            "jobname": "shot010",
            "scenefile": "/tmp/exists.py",
            "outputPath": "/render/out/frame.####.png",
            "jobcode": "J42",
        }))
        .unwrap();

        assert_eq!(job.job_name, "shot010");
        assert_eq!(job.job_code.as_deref(), Some("J42"));
        assert_eq!(job.output_path, Some(PathBuf::from("/render/out/frame.####.png")));
        assert_eq!(job.frames_per_task, 1);
        assert!(job.program_version.is_none());
    }

    #[test]
    fn test_deserialize_submitter_spelling() {
        let job: JobDescription = serde_json::from_value(json!({
            "jobName": "shot020",
            "filename": "/tmp/script.py",
            "submitDependendFiles": true,
            "timeout": 300,
        }))
        .unwrap();

        assert_eq!(job.scene_file, PathBuf::from("/tmp/script.py"));
        assert!(job.submit_dependent_files);
        assert_eq!(job.timeout, 300);
        assert!(job.output_path.is_none());
    }

    #[test]
    fn test_serialize_uses_wire_keys() {
        let job = JobDescription::new("a", "/s.py").with_job_code("J1");
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["scenefile"], "/s.py");
        assert_eq!(value["jobcode"], "J1");
        assert_eq!(value["jobName"], "a");
        assert!(value.get("outputPath").is_none());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let job = JobDescription::new("  ", "/s.py");
        assert!(matches!(job.validate(), Err(FarmError::InvalidJob(_))));
    }

    #[test]
    fn test_label_prefers_job_code() {
        let job = JobDescription::new("shot", "/s.py");
        assert_eq!(job.label(), "shot");
        assert_eq!(job.with_job_code("J9").label(), "J9");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"{"jobName":"x","scenefile":"/a.py"}"#).unwrap();
        let job = JobDescription::from_file(&path).unwrap();
        assert_eq!(job.job_name, "x");
    }
}
