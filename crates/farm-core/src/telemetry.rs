//! Tracing initialisation shared by Farmhand binaries.
//!
//! [`init_tracing`] installs the global subscriber once; later calls are ignored.
//! Job-scoped work runs inside [`job_span`] so every line a dispatch emits carries the
//! job label.

use tracing::{info_span, Level, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::JobDescription;

/// Environment variable holding a filter directive, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "FARM_LOG";

/// Filter used when neither `FARM_LOG` nor `RUST_LOG` is set.
///
/// Farmhand crates log at `level`; everything else stays at warn.
pub fn default_filter(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,farm_core={level},farm_plugins={level},install_resolver={level},farm={level}")
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)))
}

/// Initialise the global tracing subscriber.
///
/// * `json` selects newline-delimited JSON output for log shippers on render nodes.
/// * `level` is the verbosity of Farmhand crates when no filter variable is set.
pub fn init_tracing(json: bool, level: Level) {
    let filter = env_filter(level);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).json().with_current_span(true))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Span for work done on behalf of one job.
pub fn job_span(job: &JobDescription) -> Span {
    info_span!(
        "job",
        job = %job.label(),
        name = %job.job_name,
        version = job.program_version.as_deref().unwrap_or("default"),
    )
}
