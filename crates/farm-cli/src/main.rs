//! Farmhand CLI
//!
//! The `farm` command submits render jobs and runs them on the local node.
//!
//! ## Commands
//!
//! - `submit`: Validate a scene and queue it in the submission spool
//! - `run-job`: Dispatch a queued `job.json` on this node
//! - `resolve`: Show which installation a version request resolves to
//! - `plugin`: List plugins or show a plugin descriptor
//! - `integration`: Install or remove a plugin's host integration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use farm_core::{
    init_tracing, ConfigStore, ErrorLog, FileErrorLog, JobDescription, JsonConfigStore,
    LastUsedSettings, SpoolSubmitter, SubmissionForm, SubmitResult,
};
use farm_plugins::{
    load_plugin, HostEnvironment, JobOutcome, LocalWorker, PluginHost, SubmissionContext,
    WorkerContext, PLUGIN_NAMES,
};
use install_resolver::{platform_default, InstallationResolver};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "farm")]
#[command(author = "Farmhand Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render-farm job submission and dispatch", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: $FARM_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a scene file as a render job
    Submit {
        /// Scene file to render (absolute path with extension)
        scene: PathBuf,

        /// Job name
        #[arg(short = 'n', long)]
        job_name: String,

        /// Application plugin
        #[arg(short, long, default_value = "Python")]
        plugin: String,

        /// Project name (default: last used)
        #[arg(long)]
        project: Option<String>,

        /// Job priority (default: last used)
        #[arg(long)]
        priority: Option<i64>,

        /// Frames per task (default: last used)
        #[arg(long)]
        frames_per_task: Option<i64>,

        /// Task timeout in seconds (default: last used)
        #[arg(long)]
        timeout: Option<u64>,

        /// Concurrent tasks (default: last used)
        #[arg(long)]
        concurrent_tasks: Option<i64>,

        /// Submit the job suspended
        #[arg(long)]
        suspended: bool,

        /// Also submit dependent files
        #[arg(long)]
        dependent_files: bool,

        /// Do not upload rendered output
        #[arg(long)]
        no_upload: bool,

        /// Output path (default: the scene file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Required application version
        #[arg(long)]
        program_version: Option<String>,

        /// Spool directory (default: $FARM_SPOOL or the user data dir)
        #[arg(long)]
        spool: Option<PathBuf>,
    },

    /// Dispatch a queued job on this node
    RunJob {
        /// Path to job.json
        job: PathBuf,

        /// Application plugin
        #[arg(short, long, default_value = "Python")]
        plugin: String,

        /// Render next to the output path instead of the scratch root
        #[arg(long)]
        local: bool,

        /// Scratch root (default: $FARM_SLAVE_ROOT or the user data dir)
        #[arg(long)]
        slave_root: Option<PathBuf>,

        /// Append job log lines to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Return once the process is started
        #[arg(long)]
        no_wait: bool,
    },

    /// Resolve an application installation
    Resolve {
        /// Application short name
        #[arg(default_value = "Python")]
        app: String,

        /// Requested version (default: newest)
        version: Option<String>,

        /// Installation directory that wins when it exists
        #[arg(long)]
        override_dir: Option<PathBuf>,

        /// List every discovered installation instead
        #[arg(long)]
        list: bool,
    },

    /// Plugin information
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },

    /// Host integration management
    Integration {
        #[command(subcommand)]
        action: IntegrationAction,
    },
}

#[derive(Subcommand)]
enum PluginAction {
    /// List available plugins
    List,

    /// Print a plugin descriptor as JSON
    Info {
        /// Plugin name
        name: String,
    },
}

#[derive(Subcommand)]
enum IntegrationAction {
    /// Install the plugin's integration into its host application
    Add {
        /// Plugin name
        plugin: String,
    },

    /// Remove the plugin's integration from an installation
    Remove {
        /// Plugin name
        plugin: String,

        /// Installation to remove the integration from
        install_path: PathBuf,
    },
}

/// Arguments of `farm submit` beyond the scene file.
struct SubmitArgs {
    job_name: String,
    project: Option<String>,
    priority: Option<i64>,
    frames_per_task: Option<i64>,
    timeout: Option<u64>,
    concurrent_tasks: Option<i64>,
    suspended: bool,
    dependent_files: bool,
    no_upload: bool,
    output: Option<PathBuf>,
    program_version: Option<String>,
}

#[derive(Serialize)]
struct InstallationRow {
    version: String,
    install_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let store: Arc<dyn ConfigStore> = match &cli.config {
        Some(path) => Arc::new(JsonConfigStore::new(path)),
        None => Arc::new(JsonConfigStore::from_env().context("Failed to locate config file")?),
    };
    let error_log: Arc<dyn ErrorLog> =
        Arc::new(FileErrorLog::from_env().context("Failed to locate error log")?);

    match cli.command {
        Commands::Submit {
            scene,
            job_name,
            plugin,
            project,
            priority,
            frames_per_task,
            timeout,
            concurrent_tasks,
            suspended,
            dependent_files,
            no_upload,
            output,
            program_version,
            spool,
        } => {
            let host = plugin_host(&plugin, store.clone(), error_log)?;
            let submitter = match spool {
                Some(dir) => SpoolSubmitter::new(dir),
                None => SpoolSubmitter::from_env().context("Failed to locate spool directory")?,
            };
            let args = SubmitArgs {
                job_name,
                project,
                priority,
                frames_per_task,
                timeout,
                concurrent_tasks,
                suspended,
                dependent_files,
                no_upload,
                output,
                program_version,
            };
            cmd_submit(&host, store.as_ref(), &submitter, scene, args).await
        }
        Commands::RunJob {
            job,
            plugin,
            local,
            slave_root,
            log_file,
            no_wait,
        } => {
            let host = plugin_host(&plugin, store.clone(), error_log)?;
            let mut worker = match slave_root {
                Some(root) => LocalWorker::from_config(store.as_ref(), root)?,
                None => LocalWorker::from_env(store.as_ref())
                    .context("Failed to locate worker scratch root")?,
            };
            if local {
                worker = worker.with_local_mode(true);
            }
            if let Some(path) = log_file {
                worker = worker.with_log_file(path);
            }
            cmd_run_job(&host, &worker, &job, !no_wait).await
        }
        Commands::Resolve {
            app,
            version,
            override_dir,
            list,
        } => cmd_resolve(
            store.as_ref(),
            &app,
            version.as_deref(),
            override_dir.as_deref(),
            list,
        ),
        Commands::Plugin { action } => match action {
            PluginAction::List => cmd_plugin_list(),
            PluginAction::Info { name } => cmd_plugin_info(&name, store),
        },
        Commands::Integration { action } => match action {
            IntegrationAction::Add { plugin } => {
                let host = plugin_host(&plugin, store, error_log)?;
                cmd_integration_add(&host).await
            }
            IntegrationAction::Remove {
                plugin,
                install_path,
            } => {
                let host = plugin_host(&plugin, store, error_log)?;
                cmd_integration_remove(&host, &install_path).await
            }
        },
    }
}

fn plugin_host(
    name: &str,
    store: Arc<dyn ConfigStore>,
    error_log: Arc<dyn ErrorLog>,
) -> Result<PluginHost> {
    let plugin = load_plugin(name, store).with_context(|| format!("Failed to load plugin {name}"))?;
    Ok(PluginHost::new(plugin, error_log))
}

/// Build a form from last-used settings overlaid with the given arguments and submit it.
async fn cmd_submit(
    host: &PluginHost,
    store: &dyn ConfigStore,
    submitter: &SpoolSubmitter,
    scene: PathBuf,
    args: SubmitArgs,
) -> Result<()> {
    let mut form = SubmissionForm::default();
    LastUsedSettings::load(store)
        .context("Failed to load last used settings")?
        .apply_to(&mut form);

    form.job_name = args.job_name;
    form.scene_file = scene;
    form.output_path = args.output;
    form.program_version = args.program_version;
    if let Some(project) = args.project {
        form.project_name = project;
    }
    if let Some(priority) = args.priority {
        form.priority = priority;
    }
    if let Some(frames) = args.frames_per_task {
        form.frames_per_task = frames;
    }
    if let Some(timeout) = args.timeout {
        form.task_timeout = timeout;
    }
    if let Some(concurrent) = args.concurrent_tasks {
        form.concurrent_tasks = concurrent;
    }
    form.suspended |= args.suspended;
    form.dependent_files |= args.dependent_files;
    if args.no_upload {
        form.upload_output = false;
    }

    let ctx = SubmissionContext {
        current_file: Some(form.scene_file.clone()),
        scene_files: vec![form.scene_file.clone()],
    };
    let result = farm_plugins::submit(host, &form, store, submitter, &ctx).await?;

    match result {
        SubmitResult::Success {
            job_code,
            output_path,
            ..
        } => {
            println!("Submitted job {job_code}");
            println!("Output: {}", output_path.display());
            Ok(())
        }
        SubmitResult::Canceled(message) => anyhow::bail!(message),
        SubmitResult::Failed(message) => anyhow::bail!("Submission failed: {message}"),
    }
}

/// Start a queued job and, unless `wait` is false, wait for the render process.
async fn cmd_run_job(host: &PluginHost, worker: &LocalWorker, job_path: &Path, wait: bool) -> Result<()> {
    let job = JobDescription::from_file(job_path)
        .with_context(|| format!("Failed to read job file {}", job_path.display()))?;
    info!(job = %job.label(), plugin = %host.descriptor().plugin_name, "dispatching job");

    let outcome = host
        .start_job(worker, &job)
        .await
        .context("Plugin faulted while starting the job, see the error log")?;

    match outcome {
        JobOutcome::Started(handle) => {
            println!("Started job {} (pid {:?})", handle.job_code(), handle.pid());
            if !wait {
                return Ok(());
            }
            let exit = handle.wait().await;
            print!("{}", exit.stdout);
            eprint!("{}", exit.stderr);
            println!(
                "Render finished: exit code {} in {} ms",
                exit.exit_code, exit.duration_ms
            );
            if exit.passed() {
                Ok(())
            } else {
                worker.rendering_failed(&job);
                anyhow::bail!("Render process failed for job {}", job.label())
            }
        }
        JobOutcome::Skipped(reason) => anyhow::bail!("Job skipped: {reason}"),
        JobOutcome::Failed(reason) => anyhow::bail!("Job failed: {reason}"),
    }
}

fn cmd_resolve(
    store: &dyn ConfigStore,
    app: &str,
    version: Option<&str>,
    override_dir: Option<&Path>,
    list: bool,
) -> Result<()> {
    let discovery = platform_default(store, app).context("Failed to set up installation discovery")?;
    let mut resolver = InstallationResolver::new(app, discovery);
    if let Some(dir) = override_dir {
        resolver = resolver.with_override(dir);
    }

    if list {
        let rows: Vec<InstallationRow> = resolver
            .installations()?
            .into_iter()
            .map(|r| InstallationRow {
                version: r.version.to_string(),
                install_dir: r.install_dir,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let dir = resolver.try_resolve(version)?;
    println!("{}", dir.display());
    Ok(())
}

fn cmd_plugin_list() -> Result<()> {
    for name in PLUGIN_NAMES {
        println!("{name}");
    }
    Ok(())
}

fn cmd_plugin_info(name: &str, store: Arc<dyn ConfigStore>) -> Result<()> {
    let plugin = load_plugin(name, store)?;
    println!("{}", serde_json::to_string_pretty(plugin.descriptor())?);
    Ok(())
}

async fn cmd_integration_add(host: &PluginHost) -> Result<()> {
    let name = &host.descriptor().plugin_name;
    if host.integration_add(&HostEnvironment::current()).await {
        println!("{name} integration added");
        Ok(())
    } else {
        anyhow::bail!("{name} integration could not be added on this platform")
    }
}

async fn cmd_integration_remove(host: &PluginHost, install_path: &Path) -> Result<()> {
    let name = &host.descriptor().plugin_name;
    if host
        .integration_remove(&HostEnvironment::current(), install_path)
        .await
    {
        println!("{name} integration removed from {}", install_path.display());
        Ok(())
    } else {
        anyhow::bail!("{name} integration could not be removed on this platform")
    }
}
