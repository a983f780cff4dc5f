//! Concrete [`EventSink`] implementations: a `tracing`-backed console sink
//! for the CLI, and an in-memory recorder for tests.

use crate::sink::EventSink;
use camino::Utf8PathBuf;
use pipeliner_store::TaskStatus;
use std::sync::Mutex;

/// Forwards every callback to `tracing` at an appropriate level. This is the
/// sink `pipeliner-cli` installs when no richer UI is attached.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn initialize_task(
        &self,
        task: &str,
        count: usize,
        max_count: usize,
        status: TaskStatus,
        outputs: Option<&[Utf8PathBuf]>,
    ) {
        tracing::info!(task, count, max_count, ?status, ?outputs, "task initialized");
    }

    fn start_task(&self, task: &str) {
        tracing::info!(task, "task started");
    }

    fn end_task(&self, task: &str, status: TaskStatus) {
        match status {
            TaskStatus::Success => tracing::info!(task, "task succeeded"),
            TaskStatus::Error => tracing::error!(task, "task failed"),
            TaskStatus::Cancelled => tracing::warn!(task, "task cancelled"),
            other => tracing::info!(task, ?other, "task ended"),
        }
    }

    fn update_task_progress(&self, task: &str, current_count: usize, max_count: usize) {
        tracing::debug!(task, current_count, max_count, "task progress");
    }

    fn update_task_stdout(&self, task: &str, line: &str) {
        tracing::trace!(task, line, "task stdout");
    }

    fn update_task_stderr(&self, task: &str, line: &str) {
        tracing::trace!(task, line, "task stderr");
    }

    fn update_task_output_files(&self, task: &str, paths: &[Utf8PathBuf]) {
        tracing::info!(task, ?paths, "task output files");
    }
}

/// In-memory event recorder used by scheduler integration tests to assert
/// event ordering (§8's "exactly one `start_task`/`end_task`" properties).
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<String>>,
    cancelled: Mutex<std::collections::HashSet<String>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Mark `task` as cancelled; the next `check_cancelled` poll for it
    /// returns true.
    pub fn cancel(&self, task: &str) {
        self.cancelled.lock().unwrap().insert(task.to_string());
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

impl EventSink for RecordingSink {
    fn initialize_task(
        &self,
        task: &str,
        count: usize,
        max_count: usize,
        status: TaskStatus,
        _outputs: Option<&[Utf8PathBuf]>,
    ) {
        self.record(format!("initialize_task({task}, {count}, {max_count}, {status:?})"));
    }

    fn start_task(&self, task: &str) {
        self.record(format!("start_task({task})"));
    }

    fn end_task(&self, task: &str, status: TaskStatus) {
        self.record(format!("end_task({task}, {status:?})"));
    }

    fn update_task_progress(&self, task: &str, current_count: usize, max_count: usize) {
        self.record(format!("update_task_progress({task}, {current_count}, {max_count})"));
    }

    fn update_task_stdout(&self, task: &str, line: &str) {
        self.record(format!("update_task_stdout({task}, {line:?})"));
    }

    fn update_task_stderr(&self, task: &str, line: &str) {
        self.record(format!("update_task_stderr({task}, {line:?})"));
    }

    fn update_task_output_files(&self, task: &str, paths: &[Utf8PathBuf]) {
        self.record(format!("update_task_output_files({task}, {paths:?})"));
    }

    fn check_cancelled(&self, task: &str) -> bool {
        self.cancelled.lock().unwrap().contains(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = RecordingSink::default();
        sink.start_task("t0");
        sink.end_task("t0", TaskStatus::Success);
        assert_eq!(sink.events(), vec!["start_task(t0)", "end_task(t0, Success)"]);
    }

    #[test]
    fn cancel_flips_check_cancelled_for_that_task_only() {
        let sink = RecordingSink::default();
        sink.cancel("t0");
        assert!(sink.check_cancelled("t0"));
        assert!(!sink.check_cancelled("t1"));
    }
}
