//! Client-side submission through an application plugin.

use farm_core::{
    job_config_entries, ConfigStore, JobSubmitter, LastUsedSettings, SubmissionForm, SubmitError,
    SubmitResult,
};
use tracing::{error, info, warn};

use crate::host::PluginHost;
use crate::plugin::{RenderSettings, SubmissionContext};

/// Validate `form`, remember its settings and hand the job to `submitter`.
///
/// The plugin's checks and config hooks run inside its render-settings bracket. Failed
/// checks cancel the submission. Once the submitter has queued a copy of the scene, the
/// plugin copies the scene's sidecar files next to it.
pub async fn submit(
    host: &PluginHost,
    form: &SubmissionForm,
    store: &dyn ConfigStore,
    submitter: &dyn JobSubmitter,
    ctx: &SubmissionContext,
) -> Result<SubmitResult, SubmitError> {
    form.validate()?;
    LastUsedSettings::from_form(form).save(store)?;

    let job = form.to_job_description();
    let job = &job;
    let result = host
        .with_render_settings(ctx, RenderSettings::default(), move || async move {
            if !host.pre_submit_checks(ctx, job).await {
                return SubmitResult::Canceled(format!(
                    "Submission canceled: {} pre-submit checks failed",
                    host.descriptor().plugin_name
                ));
            }
            let mut entries = job_config_entries(job);
            host.job_config_params(ctx, &mut entries).await;
            submitter.submit_job(job, &entries).await
        })
        .await;

    if let SubmitResult::Success {
        queued_scene: Some(queued),
        ..
    } = &result
    {
        if !host.copy_scene_file(&job.scene_file, queued).await {
            warn!(scene = %job.scene_file.display(), "sidecar files were not queued with the scene");
        }
    }

    match &result {
        SubmitResult::Success {
            job_code,
            output_path,
            ..
        } => info!(job_code = %job_code, output = %output_path.display(), "job submitted"),
        SubmitResult::Canceled(message) => warn!(%message, "submission canceled"),
        SubmitResult::Failed(message) => error!(%message, "submission failed"),
    }
    Ok(result)
}
