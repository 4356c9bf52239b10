//! Fault-intercepting boundary around an [`AppPlugin`].
//!
//! Every capability call goes through [`PluginHost::intercept`]. An error or panic inside
//! the plugin is written to the [`ErrorLog`] with a backtrace and the caller receives the
//! type's default instead. A misbehaving plugin therefore never takes the worker down,
//! and callers must check return values rather than rely on the absence of errors.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use farm_core::{job_span, ConfigEntry, ErrorLog, FaultReport, JobDescription, PluginDescriptor};
use futures::FutureExt;
use tracing::{debug, Instrument};

use crate::outcome::JobOutcome;
use crate::plugin::{AppPlugin, FrameRange, HostEnvironment, RenderSettings, SubmissionContext};
use crate::worker::WorkerContext;

pub struct PluginHost {
    plugin: Arc<dyn AppPlugin>,
    error_log: Arc<dyn ErrorLog>,
}

impl PluginHost {
    pub fn new(plugin: Arc<dyn AppPlugin>, error_log: Arc<dyn ErrorLog>) -> Self {
        Self { plugin, error_log }
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        self.plugin.descriptor()
    }

    /// Name used for error log entries, e.g. `Plugin_Python`.
    pub fn source_name(&self) -> String {
        format!("Plugin_{}", self.descriptor().plugin_name)
    }

    /// Await a capability call. Errors and panics are logged and become `None`.
    pub async fn intercept<T>(
        &self,
        operation: &str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Option<T> {
        install_panic_capture();
        take_captured_panic();
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                let backtrace = match e.backtrace().status() {
                    BacktraceStatus::Captured => e.backtrace().to_string(),
                    _ => Backtrace::force_capture().to_string(),
                };
                self.record_fault(operation, backtrace, format!("{e:#}"));
                None
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let (error, backtrace) = match take_captured_panic() {
                    Some(panic) => (
                        format!("panicked at {}: {message}", panic.location),
                        panic.backtrace,
                    ),
                    None => (
                        format!("panicked: {message}"),
                        Backtrace::force_capture().to_string(),
                    ),
                };
                self.record_fault(operation, backtrace, error);
                None
            }
        }
    }

    fn record_fault(&self, operation: &str, backtrace: String, error: String) {
        let report = FaultReport::new(
            self.source_name(),
            self.descriptor().version.clone(),
            operation,
            backtrace,
            error,
        );
        self.error_log.write_error(&report);
    }

    fn platform_supported(&self, operation: &str) -> bool {
        let supported = self.descriptor().supports_current_platform();
        if !supported {
            debug!(
                plugin = %self.descriptor().plugin_name,
                operation,
                "not supported on this platform"
            );
        }
        supported
    }

    pub async fn startup(&self, host: &HostEnvironment) -> bool {
        self.intercept("startup", self.plugin.startup(host))
            .await
            .unwrap_or_default()
    }

    pub async fn current_file_name(&self, ctx: &SubmissionContext, path: &Path) -> PathBuf {
        self.intercept("current_file_name", self.plugin.current_file_name(ctx, path))
            .await
            .unwrap_or_default()
    }

    pub async fn save_scene(&self, ctx: &SubmissionContext, path: &Path) -> bool {
        self.intercept("save_scene", self.plugin.save_scene(ctx, path))
            .await
            .unwrap_or_default()
    }

    pub async fn frame_range(&self, ctx: &SubmissionContext) -> FrameRange {
        self.intercept("frame_range", self.plugin.frame_range(ctx))
            .await
            .unwrap_or_default()
    }

    pub async fn scene_cameras(&self, ctx: &SubmissionContext) -> Vec<String> {
        self.intercept("scene_cameras", self.plugin.scene_cameras(ctx))
            .await
            .unwrap_or_default()
    }

    pub async fn camera_name(&self, ctx: &SubmissionContext, handle: &str) -> String {
        self.intercept("camera_name", self.plugin.camera_name(ctx, handle))
            .await
            .unwrap_or_default()
    }

    pub async fn external_files(&self, ctx: &SubmissionContext, is_submitting: bool) -> Vec<PathBuf> {
        self.intercept("external_files", self.plugin.external_files(ctx, is_submitting))
            .await
            .unwrap_or_default()
    }

    pub async fn current_scene_files(&self, ctx: &SubmissionContext) -> Vec<PathBuf> {
        self.intercept("current_scene_files", self.plugin.current_scene_files(ctx))
            .await
            .unwrap_or_default()
    }

    /// Whether the plugin lets the submission proceed.
    pub async fn pre_submit_checks(&self, ctx: &SubmissionContext, job: &JobDescription) -> bool {
        self.intercept("pre_submit_checks", self.plugin.pre_submit_checks(ctx, job))
            .await
            .is_some()
    }

    pub async fn job_config_params(&self, ctx: &SubmissionContext, entries: &mut Vec<ConfigEntry>) {
        self.intercept("job_config_params", self.plugin.job_config_params(ctx, entries))
            .await;
    }

    /// `None` when the plugin faulted; the fault is in the error log.
    pub async fn start_job(
        &self,
        worker: &dyn WorkerContext,
        job: &JobDescription,
    ) -> Option<JobOutcome> {
        self.intercept("start_job", self.plugin.start_job(worker, job))
            .instrument(job_span(job))
            .await
    }

    pub async fn copy_scene_file(&self, orig: &Path, target: &Path) -> bool {
        self.intercept("copy_scene_file", self.plugin.copy_scene_file(orig, target))
            .await
            .is_some()
    }

    pub async fn integration_add(&self, host: &HostEnvironment) -> bool {
        if !self.platform_supported("integration_add") {
            return false;
        }
        self.intercept("integration_add", self.plugin.integration_add(host))
            .await
            .unwrap_or_default()
    }

    pub async fn integration_remove(&self, host: &HostEnvironment, install_path: &Path) -> bool {
        if !self.platform_supported("integration_remove") {
            return false;
        }
        self.intercept(
            "integration_remove",
            self.plugin.integration_remove(host, install_path),
        )
        .await
        .unwrap_or_default()
    }

    pub async fn executable(&self) -> Option<PathBuf> {
        if !self.platform_supported("executable") {
            return None;
        }
        self.intercept("executable", self.plugin.executable())
            .await
            .flatten()
    }

    pub async fn install_path(&self, version: Option<&str>) -> Option<PathBuf> {
        if !self.platform_supported("install_path") {
            return None;
        }
        self.intercept("install_path", self.plugin.install_path(version))
            .await
            .flatten()
    }

    /// Run `body` between `pre_submit` and `undo_render_settings`.
    ///
    /// The undo hook runs even when `body` panics; the panic is resumed afterwards.
    pub async fn with_render_settings<T, F, Fut>(
        &self,
        ctx: &SubmissionContext,
        mut settings: RenderSettings,
        body: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.intercept("pre_submit", self.plugin.pre_submit(ctx, &mut settings))
            .await;
        let result = AssertUnwindSafe(body()).catch_unwind().await;
        self.intercept(
            "undo_render_settings",
            self.plugin.undo_render_settings(ctx, &settings),
        )
        .await;

        match result {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("plugin", &self.descriptor().plugin_name)
            .finish_non_exhaustive()
    }
}

/// Where the most recent panic on this thread was raised.
struct CapturedPanic {
    location: String,
    backtrace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

/// Chains a panic hook that records the panic site for [`PluginHost::intercept`].
///
/// The unwind stays on the polling thread, so the thread-local is read back on the same
/// thread by `catch_unwind`. The previous hook still runs.
fn install_panic_capture() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let captured = CapturedPanic {
                location: info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                    .unwrap_or_else(|| "<unknown>".to_string()),
                backtrace: Backtrace::force_capture().to_string(),
            };
            let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = Some(captured));
            previous(info);
        }));
    });
}

fn take_captured_panic() -> Option<CapturedPanic> {
    LAST_PANIC.try_with(|slot| slot.borrow_mut().take()).ok().flatten()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
