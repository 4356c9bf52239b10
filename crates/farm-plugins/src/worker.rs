//! Worker node context: job log, failure tracking and render process launch.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use farm_core::config::{ConfigStore, CATEGORY_GLOBALS, KEY_LOCAL_MODE};
use farm_core::{ConfigError, JobDescription, Severity};
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

use crate::outcome::{RenderExit, RenderHandle};

/// Environment variable overriding the worker's scratch root.
pub const SLAVE_ROOT_ENV: &str = "FARM_SLAVE_ROOT";

/// What a plugin sees of the worker that runs its job.
#[async_trait]
pub trait WorkerContext: Send + Sync {
    /// Append a line to the job log.
    fn write_log(&self, message: &str, severity: Severity);

    /// Mark the job as failed on this worker.
    fn rendering_failed(&self, job: &JobDescription);

    /// Whether output is written in place instead of a per-job scratch directory.
    fn local_mode(&self) -> bool;

    /// Scratch root for distributed rendering.
    fn local_slave_path(&self) -> &Path;

    /// Launch the render process. Ownership of the child passes to the returned handle.
    async fn start_render_thread(
        &self,
        args: Vec<OsString>,
        job: &JobDescription,
        program_tag: &str,
    ) -> anyhow::Result<RenderHandle>;
}

/// [`WorkerContext`] for the node the binary runs on.
#[derive(Debug)]
pub struct LocalWorker {
    local_mode: bool,
    slave_path: PathBuf,
    log_file: Option<PathBuf>,
    log: Mutex<Vec<String>>,
    failed: Mutex<Vec<String>>,
}

impl LocalWorker {
    pub fn new(slave_path: impl Into<PathBuf>) -> Self {
        Self {
            local_mode: false,
            slave_path: slave_path.into(),
            log_file: None,
            log: Mutex::new(Vec::new()),
            failed: Mutex::new(Vec::new()),
        }
    }

    /// Scratch root from `$FARM_SLAVE_ROOT` (else `<data dir>/farmhand/Slave`),
    /// local mode from `globals.localMode`.
    pub fn from_env(store: &dyn ConfigStore) -> Result<Self, ConfigError> {
        let slave_path = match std::env::var(SLAVE_ROOT_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => dirs::data_dir()
                .map(|dir| dir.join("farmhand").join("Slave"))
                .ok_or(ConfigError::NoConfigDir)?,
        };
        Self::from_config(store, slave_path)
    }

    /// Worker rooted at `slave_path` with local mode from `globals.localMode`.
    pub fn from_config(
        store: &dyn ConfigStore,
        slave_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let local_mode = store
            .get_bool(CATEGORY_GLOBALS, KEY_LOCAL_MODE)?
            .unwrap_or(false);
        Ok(Self::new(slave_path).with_local_mode(local_mode))
    }

    pub fn with_local_mode(mut self, local_mode: bool) -> Self {
        self.local_mode = local_mode;
        self
    }

    /// Also append log lines to `path`.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Job codes passed to `rendering_failed`, one entry per call.
    pub fn failed_jobs(&self) -> Vec<String> {
        self.failed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn append_to_file(&self, path: &Path, line: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(
            file,
            "{} {}",
            chrono::Local::now().format("%d/%m/%y %H:%M:%S"),
            line
        )
    }
}

#[async_trait]
impl WorkerContext for LocalWorker {
    fn write_log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(severity = severity.code(), "{message}"),
            Severity::Warning => warn!(severity = severity.code(), "{message}"),
            Severity::Error => error!(severity = severity.code(), "{message}"),
        }

        let line = format!("[{}] {}", severity.label(), message);
        if let Some(path) = &self.log_file {
            if let Err(e) = self.append_to_file(path, &line) {
                warn!(path = %path.display(), error = %e, "failed to write job log file");
            }
        }
        self.log.lock().unwrap_or_else(|e| e.into_inner()).push(line);
    }

    fn rendering_failed(&self, job: &JobDescription) {
        warn!(job = %job.label(), "rendering failed");
        self.failed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(job.label().to_string());
    }

    fn local_mode(&self) -> bool {
        self.local_mode
    }

    fn local_slave_path(&self) -> &Path {
        &self.slave_path
    }

    async fn start_render_thread(
        &self,
        args: Vec<OsString>,
        job: &JobDescription,
        program_tag: &str,
    ) -> anyhow::Result<RenderHandle> {
        let Some((program, rest)) = args.split_first() else {
            anyhow::bail!("render command for job {} is empty", job.label());
        };

        let child = Command::new(program)
            .args(rest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", program.to_string_lossy()))?;

        let pid = child.id();
        let job_code = job.label().to_string();
        info!(job = %job_code, program = program_tag, pid = ?pid, "render process started");

        let completion = tokio::spawn(monitor(child, job.timeout, job_code.clone()));
        Ok(RenderHandle::new(job_code, pid, completion))
    }
}

/// Wait for a render process, killing it once `timeout_secs` elapse (0 = no limit).
async fn monitor(child: Child, timeout_secs: u64, job_code: String) -> RenderExit {
    let start = Instant::now();

    let waited = if timeout_secs > 0 {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(job = %job_code, timeout_secs, "render process timed out");
                return RenderExit {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("timed out after {timeout_secs} seconds"),
                    duration_ms: start.elapsed().as_millis() as u64,
                    success: false,
                    timed_out: true,
                };
            }
        }
    } else {
        child.wait_with_output().await
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match waited {
        Ok(output) => {
            let exit = RenderExit {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                duration_ms,
                success: output.status.success(),
                timed_out: false,
            };
            info!(job = %job_code, exit_code = exit.exit_code, duration_ms, "render process finished");
            exit
        }
        Err(e) => {
            error!(job = %job_code, error = %e, "failed to wait for render process");
            RenderExit::failed(e.to_string(), duration_ms)
        }
    }
}
