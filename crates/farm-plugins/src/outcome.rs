//! Results of starting a job on a worker node.

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::DispatchError;

/// How a render process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderExit {
    /// Exit code (0 = success, -1 when the process gave none).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Wall time in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,

    /// Whether the job timeout killed the process.
    pub timed_out: bool,
}

impl RenderExit {
    /// Exit for a process that never produced a status.
    pub fn failed(stderr: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms,
            success: false,
            timed_out: false,
        }
    }

    /// Whether the render passed (exit code 0, not timed out).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0 && !self.timed_out
    }
}

/// A launched render process. Awaiting it yields the [`RenderExit`].
#[derive(Debug)]
pub struct RenderHandle {
    job_code: String,
    pid: Option<u32>,
    completion: JoinHandle<RenderExit>,
}

impl RenderHandle {
    pub fn new(job_code: impl Into<String>, pid: Option<u32>, completion: JoinHandle<RenderExit>) -> Self {
        Self {
            job_code: job_code.into(),
            pid,
            completion,
        }
    }

    /// Handle whose process has already finished. Must be called inside a tokio runtime.
    pub fn completed(job_code: impl Into<String>, exit: RenderExit) -> Self {
        Self::new(job_code, None, tokio::spawn(async move { exit }))
    }

    pub fn job_code(&self) -> &str {
        &self.job_code
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }

    /// Wait for the process to end.
    pub async fn wait(self) -> RenderExit {
        match self.completion.await {
            Ok(exit) => exit,
            Err(e) => RenderExit::failed(format!("render monitor task failed: {e}"), 0),
        }
    }
}

/// Result of one dispatch attempt, consumed by the worker loop.
#[derive(Debug)]
pub enum JobOutcome {
    Started(RenderHandle),
    /// Software missing on this node; another node may take the job.
    Skipped(DispatchError),
    Failed(DispatchError),
}

impl JobOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, JobOutcome::Started(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, JobOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed(_))
    }

    /// Reason for a skipped or failed job.
    pub fn reason(&self) -> Option<&DispatchError> {
        match self {
            JobOutcome::Started(_) => None,
            JobOutcome::Skipped(reason) | JobOutcome::Failed(reason) => Some(reason),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Started(_) => "started",
            JobOutcome::Skipped(_) => "skipped",
            JobOutcome::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_exit_passed() {
        let exit = RenderExit {
            exit_code: 0,
            stdout: "done".to_string(),
            stderr: String::new(),
            duration_ms: 12,
            success: true,
            timed_out: false,
        };
        assert!(exit.passed());
        assert!(!RenderExit::failed("boom", 0).passed());
    }

    #[tokio::test]
    async fn test_completed_handle_yields_exit() {
        let handle = RenderHandle::completed("J1", RenderExit::failed("no status", 3));
        assert_eq!(handle.job_code(), "J1");
        let exit = handle.wait().await;
        assert_eq!(exit.exit_code, -1);
        assert_eq!(exit.duration_ms, 3);
    }

    #[test]
    fn test_outcome_reason() {
        let outcome = JobOutcome::Failed(DispatchError::NoOutputPath);
        assert!(outcome.is_failed());
        assert_eq!(outcome.label(), "failed");
        assert_eq!(
            outcome.reason().map(ToString::to_string).as_deref(),
            Some("no outputpath specified")
        );
    }
}
