//! Worker log severities.

use serde::{Deserialize, Serialize};

/// Severity attached to a worker log line.
///
/// The numeric values are what the worker's log sink stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    Info = 0,
    Warning = 2,
    Error = 3,
}

impl Severity {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.code()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Severity::Info),
            2 => Ok(Severity::Warning),
            3 => Ok(Severity::Error),
            other => Err(format!("unknown log severity {other}")),
        }
    }
}
