//! `pipeliner` - run VIAME detection-pipeline templates over datasets.

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use pipeliner_cli::{pid_file_path, Cli, Command, JsonDatasetManifest};
use pipeliner_core::{AppConfig, PipelineManifest};
use pipeliner_dataset::{DatasetManifest, VIAMEDataset};
use pipeliner_events::{EventManager, LoggingSink};
use pipeliner_scheduler::Scheduler;
use pipeliner_store::{create_job, load_job, JobMeta, JobState};
use tracing_subscriber::EnvFilter;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
    rt.block_on(run(cli.command))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "pipeliner=info,pipeliner_scheduler=info",
        1 => "pipeliner=debug,pipeliner_scheduler=debug",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(command: Command) -> miette::Result<()> {
    match command {
        Command::Create {
            job_dir,
            pipeline_manifest,
            pipeline,
            dataset_manifest,
            datasets,
            force,
            plugin_path,
        } => {
            let app_config = AppConfig { plugin_path, ..AppConfig::default() };
            let (pipeline, datasets) =
                resolve_pipeline_and_datasets(&pipeline_manifest, &pipeline, &dataset_manifest, &datasets, &app_config)?;
            create_job(&job_dir, &pipeline, &datasets, force, &app_config).into_diagnostic()?;
            tracing::info!(%job_dir, tasks = datasets.len(), "job created");
            Ok(())
        }
        Command::Run {
            job_dir,
            pipeline_manifest,
            pipeline,
            dataset_manifest,
            datasets,
            force,
            plugin_path,
            kwiver_setup_path,
            debug,
        } => {
            let app_config = AppConfig { plugin_path, kwiver_setup_path, debug, ..AppConfig::default() };
            let (pipeline, datasets) =
                resolve_pipeline_and_datasets(&pipeline_manifest, &pipeline, &dataset_manifest, &datasets, &app_config)?;
            let (job_state, job_meta) = create_job(&job_dir, &pipeline, &datasets, force, &app_config).into_diagnostic()?;
            run_job(job_dir, job_state, job_meta, app_config).await
        }
        Command::Resume { job_dir, kwiver_setup_path, debug } => {
            let (job_state, job_meta) = load_job(&job_dir).into_diagnostic()?;
            let app_config = AppConfig { kwiver_setup_path, debug, ..AppConfig::default() };
            run_job(job_dir, job_state, job_meta, app_config).await
        }
        Command::Cancel { job_dir } => cancel(&job_dir),
    }
}

fn resolve_pipeline_and_datasets(
    pipeline_manifest: &Utf8PathBuf,
    pipeline_name: &str,
    dataset_manifest: &Utf8PathBuf,
    requested: &[String],
    app_config: &AppConfig,
) -> miette::Result<(pipeliner_core::PipelineConfig, Vec<VIAMEDataset>)> {
    let manifest = PipelineManifest::load(pipeline_manifest, app_config).into_diagnostic()?;
    let pipeline = manifest.get(pipeline_name).into_diagnostic()?.clone();

    let dataset_manifest = JsonDatasetManifest::load(dataset_manifest).into_diagnostic()?;
    let keys = if requested.is_empty() {
        dataset_manifest.list_dataset_keys()
    } else {
        requested.to_vec()
    };
    let mut datasets = Vec::with_capacity(keys.len());
    for key in keys {
        datasets.push(dataset_manifest.get_dataset(&key).into_diagnostic()?);
    }
    Ok((pipeline, datasets))
}

/// Run a job to completion, installing a pid file (for `cancel`) and a
/// Ctrl-C handler that fires the scheduler's kill-all path.
async fn run_job(job_dir: Utf8PathBuf, job_state: JobState, job_meta: JobMeta, app_config: AppConfig) -> miette::Result<()> {
    let pid_path = pid_file_path(&job_dir);
    std::fs::write(&pid_path, std::process::id().to_string()).into_diagnostic()?;

    let manager = EventManager::new(LoggingSink);
    let mut scheduler = Scheduler::new(job_state, job_meta, manager, app_config);

    let kill_handle = scheduler.kill_handle();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        tracing::warn!("received interrupt, stopping all remaining tasks");
                        kill_handle.fire();
                    }
                }
                _ = sigterm.recv() => {
                    tracing::warn!("received SIGTERM, stopping all remaining tasks");
                    kill_handle.fire();
                }
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("received interrupt, stopping all remaining tasks");
                kill_handle.fire();
            }
        }
    });

    let result = scheduler.run().await;
    let _ = std::fs::remove_file(&pid_path);
    result.into_diagnostic()?;

    if scheduler.job_state().is_job_complete() {
        tracing::info!("job complete");
    } else {
        tracing::warn!("job stopped before completion");
    }
    Ok(())
}

/// Signal a running `run`/`resume` process for this job directory to stop.
/// There is no daemon to talk to here: `run`/`resume` records its pid in
/// `meta/run.pid` on start and removes it on exit, and this sends SIGTERM,
/// which that process's own Ctrl-C handler treats identically to SIGINT.
#[cfg(unix)]
fn cancel(job_dir: &Utf8PathBuf) -> miette::Result<()> {
    use pipeliner_cli::CliError;

    let pid_path = pid_file_path(job_dir);
    let pid_text = std::fs::read_to_string(&pid_path).map_err(|_| CliError::NoRunningProcess(job_dir.clone()))?;
    let pid: i32 = pid_text.trim().parse().map_err(|_| CliError::NoRunningProcess(job_dir.clone()))?;

    // SAFETY: kill(2) with a valid pid and signal number is always safe.
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        return Err(CliError::NoRunningProcess(job_dir.clone())).into_diagnostic();
    }
    tracing::info!(pid, "sent SIGTERM");
    Ok(())
}

#[cfg(not(unix))]
fn cancel(_job_dir: &Utf8PathBuf) -> miette::Result<()> {
    Err(miette::miette!("cancel is only supported on unix targets"))
}
