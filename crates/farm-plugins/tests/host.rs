//! Plugin boundary: fault interception, render-settings bracket and submission.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use farm_core::config::{CATEGORY_LAST_USED, KEY_PROGRAM_VERSION};
use farm_core::{
    ConfigEntry, ConfigStore, JobDescription, JobSubmitter, MemoryConfigStore, MemoryErrorLog,
    PluginDescriptor, SpoolSubmitter, SubmissionForm, SubmitError, SubmitResult,
};
use farm_plugins::{
    python_descriptor, submit, AppPlugin, HostEnvironment, JobOutcome, PluginHost,
    RenderSettings, SubmissionContext, WorkerContext,
};
use tempfile::tempdir;

/// Plugin whose capabilities fail on demand and record hook order.
struct FaultyPlugin {
    descriptor: PluginDescriptor,
    calls: Mutex<Vec<&'static str>>,
    block_submission: bool,
}

impl FaultyPlugin {
    fn new() -> Self {
        Self {
            descriptor: python_descriptor(),
            calls: Mutex::new(Vec::new()),
            block_submission: false,
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppPlugin for FaultyPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn startup(&self, _host: &HostEnvironment) -> anyhow::Result<bool> {
        anyhow::bail!("no host window API")
    }

    async fn scene_cameras(&self, _ctx: &SubmissionContext) -> anyhow::Result<Vec<String>> {
        panic!("camera list corrupted")
    }

    async fn pre_submit(
        &self,
        _ctx: &SubmissionContext,
        settings: &mut RenderSettings,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("pre_submit");
        settings.values.insert("resolution".to_string(), 50.into());
        Ok(())
    }

    async fn undo_render_settings(
        &self,
        _ctx: &SubmissionContext,
        settings: &RenderSettings,
    ) -> anyhow::Result<()> {
        assert!(settings.values.contains_key("resolution"));
        self.calls.lock().unwrap().push("undo_render_settings");
        Ok(())
    }

    async fn pre_submit_checks(
        &self,
        _ctx: &SubmissionContext,
        _job: &JobDescription,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("pre_submit_checks");
        if self.block_submission {
            anyhow::bail!("scene has unsaved changes");
        }
        Ok(())
    }

    async fn start_job(
        &self,
        _worker: &dyn WorkerContext,
        job: &JobDescription,
    ) -> anyhow::Result<JobOutcome> {
        panic!("cannot start {}", job.job_name)
    }
}

#[derive(Default)]
struct RecordingSubmitter {
    submitted: Mutex<Vec<(JobDescription, Vec<ConfigEntry>)>>,
}

#[async_trait]
impl JobSubmitter for RecordingSubmitter {
    async fn submit_job(&self, job: &JobDescription, job_config: &[ConfigEntry]) -> SubmitResult {
        self.submitted
            .lock()
            .unwrap()
            .push((job.clone(), job_config.to_vec()));
        SubmitResult::Success {
            job_code: "J1".to_string(),
            output_path: job.output_path.clone().unwrap_or_default(),
            queued_scene: None,
        }
    }
}

fn host_with(plugin: Arc<FaultyPlugin>) -> (PluginHost, Arc<MemoryErrorLog>) {
    let errors = Arc::new(MemoryErrorLog::new());
    (PluginHost::new(plugin, errors.clone()), errors)
}

#[tokio::test]
async fn test_error_becomes_default_and_log_entry() {
    let (host, errors) = host_with(Arc::new(FaultyPlugin::new()));

    assert!(!host.startup(&HostEnvironment::default()).await);

    let reports = errors.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].source, "Plugin_Python");
    assert_eq!(reports[0].source_version, "v0.0.0.1");
    assert_eq!(reports[0].operation, "startup");
    assert!(reports[0].error.contains("no host window API"));
    assert!(!reports[0].backtrace.is_empty());
}

#[tokio::test]
async fn test_panic_is_contained() {
    let (host, errors) = host_with(Arc::new(FaultyPlugin::new()));
    let ctx = SubmissionContext::default();

    assert!(host.scene_cameras(&ctx).await.is_empty());

    let reports = errors.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].error.contains("camera list corrupted"));
}

#[tokio::test]
async fn test_panic_report_names_the_faulting_line() {
    let (host, errors) = host_with(Arc::new(FaultyPlugin::new()));

    host.scene_cameras(&SubmissionContext::default()).await;

    let report = &errors.reports()[0];
    // `scene_cameras` panics on line 50 of this file.
    assert!(
        report.error.starts_with("panicked at ") && report.error.contains("host.rs:50:"),
        "unexpected error text: {}",
        report.error
    );
    assert!(!report.backtrace.is_empty());
}

#[tokio::test]
async fn test_start_job_fault_yields_none() {
    let (host, errors) = host_with(Arc::new(FaultyPlugin::new()));
    let worker = farm_plugins::LocalWorker::new("/worker");
    let job = JobDescription::new("shot010", "/tmp/scene.py");

    assert!(host.start_job(&worker, &job).await.is_none());
    assert!(errors.reports()[0].error.contains("cannot start shot010"));
    assert_eq!(errors.reports()[0].operation, "start_job");
}

#[tokio::test]
async fn test_defaults_do_not_log() {
    let (host, errors) = host_with(Arc::new(FaultyPlugin::new()));
    let ctx = SubmissionContext {
        current_file: None,
        scene_files: vec![PathBuf::from("/tmp/a.py")],
    };

    assert_eq!(host.frame_range(&ctx).await.start, 0);
    assert!(host.save_scene(&ctx, &PathBuf::from("/tmp/a.py")).await);
    assert_eq!(host.current_scene_files(&ctx).await, vec![PathBuf::from("/tmp/a.py")]);
    assert_eq!(host.camera_name(&ctx, "cam1").await, "");
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_installation_hooks_respect_platforms() {
    let (host, _) = host_with(Arc::new(FaultyPlugin::new()));
    let env = HostEnvironment::default();

    // The Python descriptor only lists Windows.
    let expected = cfg!(target_os = "windows");
    assert_eq!(host.integration_add(&env).await, expected);
    assert_eq!(host.install_path(None).await, None);
}

#[tokio::test]
async fn test_undo_runs_after_failed_body() {
    let plugin = Arc::new(FaultyPlugin::new());
    let (host, _) = host_with(plugin.clone());
    let ctx = SubmissionContext::default();

    let result: Result<(), String> = host
        .with_render_settings(&ctx, RenderSettings::default(), || async {
            Err("submission rejected".to_string())
        })
        .await;

    assert!(result.is_err());
    assert_eq!(plugin.calls(), vec!["pre_submit", "undo_render_settings"]);
}

async fn crashing_submission() {
    panic!("submitter crashed")
}

#[tokio::test]
async fn test_undo_runs_after_panicking_body() {
    let plugin = Arc::new(FaultyPlugin::new());
    let (host, _) = host_with(plugin.clone());
    let ctx = SubmissionContext::default();

    let outcome = tokio::spawn(async move {
        host.with_render_settings(&ctx, RenderSettings::default(), crashing_submission)
            .await
    })
    .await;

    assert!(outcome.is_err());
    assert_eq!(plugin.calls(), vec!["pre_submit", "undo_render_settings"]);
}

fn form(scene: PathBuf) -> SubmissionForm {
    SubmissionForm {
        project_name: "commercial".to_string(),
        job_name: "shot010".to_string(),
        priority: 70,
        scene_file: scene,
        ..SubmissionForm::default()
    }
}

#[tokio::test]
async fn test_submit_runs_hooks_and_saves_settings() {
    let dir = tempdir().unwrap();
    let scene = dir.path().join("shot010.py");
    std::fs::write(&scene, "").unwrap();

    let plugin = Arc::new(FaultyPlugin::new());
    let (host, _) = host_with(plugin.clone());
    let store = MemoryConfigStore::new();
    let submitter = RecordingSubmitter::default();

    let result = submit(&host, &form(scene.clone()), &store, &submitter, &SubmissionContext::default())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(
        plugin.calls(),
        vec!["pre_submit", "pre_submit_checks", "undo_render_settings"]
    );
    assert_eq!(store.get_i64(CATEGORY_LAST_USED, "priority").unwrap(), Some(70));

    let submitted = submitter.submitted.lock().unwrap();
    let (job, config) = &submitted[0];
    assert_eq!(job.output_path.as_deref(), Some(scene.as_path()));
    assert_eq!(
        config.iter().filter(|e| e.key() == KEY_PROGRAM_VERSION).count(),
        1
    );
}

#[tokio::test]
async fn test_submit_blocked_by_checks() {
    let dir = tempdir().unwrap();
    let scene = dir.path().join("shot010.py");
    std::fs::write(&scene, "").unwrap();

    let mut plugin = FaultyPlugin::new();
    plugin.block_submission = true;
    let plugin = Arc::new(plugin);
    let (host, errors) = host_with(plugin.clone());
    let submitter = RecordingSubmitter::default();

    let result = submit(
        &host,
        &form(scene),
        &MemoryConfigStore::new(),
        &submitter,
        &SubmissionContext::default(),
    )
    .await
    .unwrap();

    assert!(matches!(result, SubmitResult::Canceled(_)));
    assert!(submitter.submitted.lock().unwrap().is_empty());
    assert_eq!(errors.len(), 1);
    assert_eq!(plugin.calls().last(), Some(&"undo_render_settings"));
}

#[tokio::test]
async fn test_submit_rejects_incomplete_filename() {
    let (host, _) = host_with(Arc::new(FaultyPlugin::new()));
    let submitter = RecordingSubmitter::default();

    let err = submit(
        &host,
        &form(PathBuf::from("shot010")),
        &MemoryConfigStore::new(),
        &submitter,
        &SubmissionContext::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SubmitError::InvalidPath { .. }));
    assert!(submitter.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_queues_sidecars_with_scene() {
    let dir = tempdir().unwrap();
    let scene = dir.path().join("shot010.py");
    std::fs::write(&scene, "").unwrap();
    std::fs::write(dir.path().join("shot010.abc"), "cache").unwrap();
    std::fs::write(dir.path().join("shot010.txt"), "notes").unwrap();

    let (host, errors) = host_with(Arc::new(FaultyPlugin::new()));
    let spool = SpoolSubmitter::new(dir.path().join("spool"));

    let result = submit(
        &host,
        &form(scene),
        &MemoryConfigStore::new(),
        &spool,
        &SubmissionContext::default(),
    )
    .await
    .unwrap();

    let SubmitResult::Success {
        queued_scene: Some(queued),
        ..
    } = result
    else {
        panic!("expected a queued scene, got {result:?}");
    };
    let queued_dir = queued.parent().unwrap();
    assert!(queued_dir.join("shot010.py").exists());
    assert!(queued_dir.join("shot010.abc").exists());
    assert!(!queued_dir.join("shot010.txt").exists());
    assert!(errors.is_empty());
}
