//! Persistent log of faults intercepted at the plugin boundary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ConfigError;

/// Environment variable overriding the error log location.
pub const ERROR_LOG_ENV: &str = "FARM_ERROR_LOG";

/// One intercepted fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultReport {
    pub timestamp: DateTime<Local>,
    /// Component that raised, e.g. `Plugin_Python`.
    pub source: String,
    pub source_version: String,
    /// Capability that was being called.
    pub operation: String,
    pub backtrace: String,
    pub error: String,
}

impl FaultReport {
    pub fn new(
        source: impl Into<String>,
        source_version: impl Into<String>,
        operation: impl Into<String>,
        backtrace: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            source: source.into(),
            source_version: source_version.into(),
            operation: operation.into(),
            backtrace: backtrace.into(),
            error: error.into(),
        }
    }

    /// Text block written to the log file.
    pub fn render(&self) -> String {
        format!(
            "{} ERROR - {} {} ({}):\n{}\n\n{}",
            self.timestamp.format("%d/%m/%y %H:%M:%S"),
            self.source,
            self.source_version,
            self.operation,
            self.backtrace.trim_end(),
            self.error.trim_end(),
        )
    }
}

/// Sink for fault reports.
pub trait ErrorLog: Send + Sync {
    fn write_error(&self, report: &FaultReport);
}

/// Default error log location: `$FARM_ERROR_LOG`, else `<config dir>/farmhand/ErrorLog.txt`.
pub fn default_error_log_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(ERROR_LOG_ENV) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("farmhand").join("ErrorLog.txt"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Appends rendered reports to a text file, separated by blank lines.
#[derive(Debug)]
pub struct FileErrorLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(default_error_log_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{text}\n")
    }
}

impl ErrorLog for FileErrorLog {
    fn write_error(&self, report: &FaultReport) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        error!(
            source = %report.source,
            operation = %report.operation,
            error = %report.error,
            "plugin fault intercepted"
        );
        // The error log is the last resort; a failure to write it is only traced.
        if let Err(e) = self.append(&report.render()) {
            error!(path = %self.path.display(), error = %e, "failed to append to error log");
        }
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemoryErrorLog {
    reports: Mutex<Vec<FaultReport>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<FaultReport> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorLog for MemoryErrorLog {
    fn write_error(&self, report: &FaultReport) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report() -> FaultReport {
        FaultReport::new(
            "Plugin_Python",
            "v0.0.0.1",
            "start_job",
            "   0: farm_plugins::host::intercept",
            "scene exploded",
        )
    }

    #[test]
    fn test_render_contains_all_parts() {
        let text = report().render();
        assert!(text.contains("ERROR - Plugin_Python v0.0.0.1 (start_job):"));
        assert!(text.contains("farm_plugins::host::intercept"));
        assert!(text.ends_with("scene exploded"));
    }

    #[test]
    fn test_file_log_appends() {
        let dir = tempdir().unwrap();
        let log = FileErrorLog::new(dir.path().join("logs").join("ErrorLog.txt"));

        log.write_error(&report());
        log.write_error(&report());

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.matches("scene exploded").count(), 2);
    }

    #[test]
    fn test_memory_log_collects() {
        let log = MemoryErrorLog::new();
        assert!(log.is_empty());
        log.write_error(&report());
        assert_eq!(log.len(), 1);
        assert_eq!(log.reports()[0].operation, "start_job");
    }
}
