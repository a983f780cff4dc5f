//! The sequential task executor: one `kwiver runner` child process at a
//! time, with a progress poller and a stdout pump running alongside it.

use crate::artifacts::{self, PendingOutputsGuard};
use crate::error::SchedulerError;
use crate::progress;
use crate::runner::{kill_process_tree, KwiverRunner, RunnerOptions};
use crate::stop::StopSignal;
use camino::Utf8PathBuf;
use chrono::Utc;
use pipeliner_core::{AppConfig, ConfigOptionGroup, ConfigType};
use pipeliner_events::{EventManager, EventSink};
use pipeliner_store::{layout, JobMeta, JobState, TaskStatus};
use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const READ_TIMEOUT: Duration = Duration::from_millis(500);
const PROCESS_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const CANCEL_KILL_WAIT: Duration = Duration::from_secs(5);
const CANCEL_RETRY_ATTEMPTS: u32 = 30;
const CANCEL_RETRY_INTERVAL: Duration = Duration::from_secs(1);

enum TaskOutcome {
    Success,
    Error,
    Cancelled,
    KilledAll,
}

/// Drives a job's tasks to completion, one external process at a time.
pub struct Scheduler<S: EventSink> {
    job_state: JobState,
    job_meta: JobMeta,
    manager: Arc<EventManager<S>>,
    runner_options: RunnerOptions,
    progress_poll_freq: Duration,
    kill_event: StopSignal,
}

impl<S: EventSink + Send + Sync + 'static> Scheduler<S> {
    /// `app_config` replaces the source's process-global settings object:
    /// `kwiver_setup_path`/`debug` become this run's [`RunnerOptions`], and
    /// `progress_poll_freq_secs` sets the poll interval (still overridable
    /// via [`Self::with_progress_poll_freq`]).
    pub fn new(job_state: JobState, job_meta: JobMeta, manager: EventManager<S>, app_config: AppConfig) -> Self {
        Self {
            job_state,
            job_meta,
            manager: Arc::new(manager),
            runner_options: RunnerOptions {
                kwiver_setup_path: app_config.kwiver_setup_path,
                debug: app_config.debug,
            },
            progress_poll_freq: Duration::from_secs(app_config.progress_poll_freq_secs),
            kill_event: StopSignal::new(),
        }
    }

    pub fn with_progress_poll_freq(mut self, freq: Duration) -> Self {
        self.progress_poll_freq = freq;
        self
    }

    /// A clonable handle that, when fired, aborts the whole job: every
    /// remaining task (including whichever is currently running) ends
    /// ERROR, never CANCELLED.
    pub fn kill_handle(&self) -> StopSignal {
        self.kill_event.clone()
    }

    pub fn manager(&self) -> &EventManager<S> {
        &self.manager
    }

    /// A clonable handle to the same [`EventManager`] the scheduler drives,
    /// for callers (tests, an interactive observer) that need to reach it
    /// while `run` holds `&mut self`.
    pub fn manager_arc(&self) -> Arc<EventManager<S>> {
        Arc::clone(&self.manager)
    }

    pub fn job_state(&self) -> &JobState {
        &self.job_state
    }

    pub fn job_meta(&self) -> &JobMeta {
        &self.job_meta
    }

    /// Run every task to completion, in `JobState.tasks()` order. Returns
    /// once the job is complete or kill-all has been triggered.
    pub async fn run(&mut self) -> Result<(), SchedulerError> {
        self.emit_resume_bursts()?;

        while let Some(current) = self.job_state.current_task() {
            if self.kill_event.is_set() {
                self.kill_all_remaining()?;
                return Ok(());
            }
            if let TaskOutcome::KilledAll = self.run_one_task(&current).await? {
                return Ok(());
            }
        }
        Ok(())
    }

    fn emit_resume_bursts(&self) -> Result<(), SchedulerError> {
        for task in self.job_state.tasks_with_status(TaskStatus::Success) {
            let meta = self
                .job_meta
                .get(&task)
                .ok_or_else(|| SchedulerError::UnknownTask(task.clone()))?;
            let max_count = meta.dataset.max_image_count();
            let outputs = self.job_state.get_task_outputs(&task).unwrap_or_default();
            self.manager
                .initialize_task(&task, max_count, max_count, TaskStatus::Success, Some(&outputs));

            let log_path = layout::logs_dir(self.job_meta.root_dir()).join(format!("kwiver-output-{task}.log"));
            if let Ok(content) = std::fs::read_to_string(&log_path) {
                for line in content.lines() {
                    self.manager.update_task_stdout(&task, line);
                }
            }
        }

        for task in self.job_state.tasks() {
            if self.job_state.get_status(task) == Some(TaskStatus::Success) {
                continue;
            }
            let meta = self
                .job_meta
                .get(task)
                .ok_or_else(|| SchedulerError::UnknownTask(task.clone()))?;
            let max_count = meta.dataset.max_image_count();
            self.manager.initialize_task(task, 0, max_count, TaskStatus::Initialized, None);
        }
        Ok(())
    }

    async fn run_one_task(&mut self, task: &str) -> Result<TaskOutcome, SchedulerError> {
        let output_group = match self.job_meta.output_group(task) {
            Some(result) => result?,
            None => return Err(SchedulerError::UnknownTask(task.to_string())),
        };

        let outputs_pending_dir = layout::outputs_pending_dir(self.job_meta.root_dir());
        let (image_list_raw, other_raw) = split_output_ports(&output_group);
        let now = Utc::now();
        let image_list_abs = pipeliner_compiler::compile_output_filenames(&image_list_raw, &outputs_pending_dir, now);
        let other_abs = pipeliner_compiler::compile_output_filenames(&other_raw, &outputs_pending_dir, now);

        let monitor_path = first_sorted_value(&image_list_abs).map(Utf8PathBuf::from);

        let mut sorted_env = BTreeMap::new();
        sorted_env.extend(image_list_abs.clone());
        sorted_env.extend(other_abs.clone());
        let output_paths: Vec<Utf8PathBuf> = sorted_env.values().map(Utf8PathBuf::from).collect();
        let env: HashMap<String, String> = sorted_env.into_iter().collect();

        let compiled_pipeline = self
            .job_meta
            .compiled_pipeline_path(task)
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))?;
        let log_path = layout::logs_dir(self.job_meta.root_dir()).join(format!("kwiver-output-{task}.log"));
        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&log_path)
            .map_err(|e| SchedulerError::Io { path: log_path.clone(), source: e })?;

        let guard = PendingOutputsGuard::new(output_paths.clone(), layout::outputs_error_dir(self.job_meta.root_dir()));

        self.job_state.set_task_status(task, TaskStatus::Running)?;
        self.manager.start_task(task);

        let progress_stop = StopSignal::new();
        let progress_handle = monitor_path.clone().map(|path| {
            tokio::spawn(progress::run(
                progress_stop.clone(),
                task.to_string(),
                Arc::clone(&self.manager),
                path,
                self.progress_poll_freq,
            ))
        });

        let runner = KwiverRunner::new(
            compiled_pipeline,
            self.job_meta.root_dir().to_path_buf(),
            env,
            HashMap::new(),
            self.runner_options.clone(),
        );
        let mut child = runner.spawn()?;
        let stdout = child.stdout.take().expect("runner spawned with piped stdout");
        let stderr = child.stderr.take().expect("runner spawned with piped stderr");

        let (tx, mut rx) = mpsc::unbounded_channel::<Option<String>>();
        let pump_handle = tokio::spawn(pump_output(stdout, stderr, tx));

        let mut cancelled = false;
        loop {
            if self.kill_event.is_set() {
                progress_stop.fire();
                if let Some(handle) = progress_handle {
                    handle.abort();
                }
                pump_handle.abort();
                let _ = kill_process_tree(&mut child).await;
                let _ = tokio::time::timeout(PROCESS_WAIT_TIMEOUT, child.wait()).await;
                drop(guard);
                self.kill_all_remaining()?;
                return Ok(TaskOutcome::KilledAll);
            }

            match tokio::time::timeout(READ_TIMEOUT, rx.recv()).await {
                Ok(Some(Some(line))) => {
                    let _ = writeln!(log_file, "{line}");
                    self.manager.update_task_stdout(task, &line);
                }
                Ok(Some(None)) | Ok(None) => break,
                Err(_elapsed) => {
                    if self.manager.check_cancelled(task) {
                        cancelled = true;
                        break;
                    }
                }
            }
        }

        progress_stop.fire();
        if let Some(handle) = progress_handle {
            handle.abort();
        }
        pump_handle.abort();

        let outcome = if cancelled {
            let _ = kill_process_tree(&mut child).await;
            let _ = tokio::time::timeout(CANCEL_KILL_WAIT, child.wait()).await;
            if let Some(path) = &monitor_path {
                progress::poll_once(&self.manager, task, path);
            }
            self.job_state.set_task_status(task, TaskStatus::Cancelled)?;
            self.manager.end_task(task, TaskStatus::Cancelled);
            artifacts::move_existing_with_retry(
                &output_paths,
                &layout::outputs_error_dir(self.job_meta.root_dir()),
                CANCEL_RETRY_ATTEMPTS,
                CANCEL_RETRY_INTERVAL,
            )
            .await;
            TaskOutcome::Cancelled
        } else {
            let exit_ok = match tokio::time::timeout(PROCESS_WAIT_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => status.success(),
                _ => {
                    let _ = kill_process_tree(&mut child).await;
                    false
                }
            };
            if let Some(path) = &monitor_path {
                progress::poll_once(&self.manager, task, path);
            }
            if exit_ok {
                let moved = artifacts::move_existing(&output_paths, &layout::outputs_success_dir(self.job_meta.root_dir()));
                self.job_state.set_task_outputs(task, moved.clone())?;
                self.job_state.set_task_status(task, TaskStatus::Success)?;
                self.manager.end_task(task, TaskStatus::Success);
                self.manager.update_task_output_files(task, &moved);
                TaskOutcome::Success
            } else {
                artifacts::move_existing(&output_paths, &layout::outputs_error_dir(self.job_meta.root_dir()));
                self.job_state.set_task_status(task, TaskStatus::Error)?;
                self.manager.end_task(task, TaskStatus::Error);
                TaskOutcome::Error
            }
        };

        drop(guard);
        Ok(outcome)
    }

    /// Mark every non-complete task ERROR (including whichever is currently
    /// running) and sweep `outputs_pending/` into `outputs_error/`. Mirrors
    /// the source's bias: the task that was killed mid-run ends ERROR, not
    /// CANCELLED, since kill-all already decided the status before the child
    /// actually died.
    fn kill_all_remaining(&mut self) -> Result<(), SchedulerError> {
        let remaining: Vec<String> = self
            .job_state
            .tasks()
            .iter()
            .filter(|t| !self.job_state.is_task_complete(t))
            .cloned()
            .collect();
        for task in &remaining {
            self.job_state.set_task_status(task, TaskStatus::Error)?;
            self.manager.end_task(task, TaskStatus::Error);
        }
        artifacts::sweep_pending_to_error(
            &layout::outputs_pending_dir(self.job_meta.root_dir()),
            &layout::outputs_error_dir(self.job_meta.root_dir()),
        );
        Ok(())
    }
}

/// Reads the child's stdout and stderr concurrently, forwarding every line
/// through `tx` as it arrives so the caller sees one merged stream; sends a
/// sentinel `None` once both pipes have reached EOF.
async fn pump_output(
    stdout: tokio::process::ChildStdout,
    stderr: tokio::process::ChildStderr,
    tx: mpsc::UnboundedSender<Option<String>>,
) {
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_done = false;
    let mut err_done = false;

    while !(out_done && err_done) {
        tokio::select! {
            line = out_lines.next_line(), if !out_done => {
                match line {
                    Ok(Some(l)) => if tx.send(Some(l)).is_err() { return },
                    _ => out_done = true,
                }
            }
            line = err_lines.next_line(), if !err_done => {
                match line {
                    Ok(Some(l)) => if tx.send(Some(l)).is_err() { return },
                    _ => err_done = true,
                }
            }
        }
    }
    let _ = tx.send(None);
}

/// Splits an output group's env-wired options into image-list ports (with
/// `.txt` reattached, stripped by [`pipeliner_core::ConfigType::validate`])
/// and everything else (detections CSVs get `.csv` back; anything else is
/// passed through as-is).
fn split_output_ports(group: &ConfigOptionGroup) -> (HashMap<String, String>, HashMap<String, String>) {
    let mut image_lists = HashMap::new();
    let mut others = HashMap::new();
    for option in group.iter() {
        let Some((env_var, value)) = option.get_env() else { continue };
        match option.type_tag {
            ConfigType::OutputImageList => {
                image_lists.insert(env_var, format!("{value}.txt"));
            }
            ConfigType::OutputDetectionsFile => {
                others.insert(env_var, format!("{value}.csv"));
            }
            _ => {
                others.insert(env_var, value);
            }
        }
    }
    (image_lists, others)
}

fn first_sorted_value(map: &HashMap<String, String>) -> Option<String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.first().map(|k| map[*k].clone())
}
