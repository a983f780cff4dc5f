//! The `EventManager` contract: an observer protocol the scheduler drives to
//! report per-task progress to UI/logging collaborators.
//!
//! `EventManager` owns the bookkeeping every collaborator needs for free
//! (start/end times, current counts, current statuses, which tasks have been
//! initialized) and dispatches to a [`EventSink`] for the parts that are
//! genuinely collaborator-specific. This mirrors the base/subclass split of
//! the system this was modeled on, without requiring a subclass to re-derive
//! elapsed time or duplicate status bookkeeping.

pub mod sink;
pub mod sinks;

pub use sink::EventSink;
pub use sinks::{LoggingSink, RecordingSink};

use camino::Utf8PathBuf;
use pipeliner_store::TaskStatus;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Default)]
struct TaskBookkeeping {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    status: Option<TaskStatus>,
    count: usize,
    max_count: usize,
}

/// Dispatches scheduler callbacks to an [`EventSink`], tracking the shared
/// per-task bookkeeping (`start_time`, `end_time`, current counts and
/// statuses, which tasks have been initialized) that every sink needs.
///
/// All methods are non-blocking from the scheduler's perspective: a slow
/// sink implementation stalls only the scheduler thread that called it, it
/// must not perform its own blocking I/O in a way that could deadlock.
pub struct EventManager<S: EventSink> {
    sink: S,
    tasks: Mutex<HashMap<String, TaskBookkeeping>>,
    initialized_order: Mutex<Vec<String>>,
}

impl<S: EventSink> EventManager<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            tasks: Mutex::new(HashMap::new()),
            initialized_order: Mutex::new(Vec::new()),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn initialize_task(
        &self,
        task: &str,
        count: usize,
        max_count: usize,
        status: TaskStatus,
        outputs: Option<&[Utf8PathBuf]>,
    ) {
        let mut tasks = self.tasks.lock().unwrap();
        let entry = tasks.entry(task.to_string()).or_default();
        entry.count = count;
        entry.max_count = max_count;
        entry.status = Some(status);
        drop(tasks);
        self.initialized_order.lock().unwrap().push(task.to_string());
        self.sink.initialize_task(task, count, max_count, status, outputs);
    }

    pub fn start_task(&self, task: &str) {
        {
            let mut tasks = self.tasks.lock().unwrap();
            let entry = tasks.entry(task.to_string()).or_default();
            entry.status = Some(TaskStatus::Running);
            entry.start_time = Some(Instant::now());
        }
        self.sink.start_task(task);
    }

    pub fn end_task(&self, task: &str, status: TaskStatus) {
        {
            let mut tasks = self.tasks.lock().unwrap();
            let entry = tasks.entry(task.to_string()).or_default();
            entry.status = Some(status);
            entry.end_time = Some(Instant::now());
        }
        self.sink.end_task(task, status);
    }

    pub fn update_task_progress(&self, task: &str, current_count: usize) {
        let max_count = {
            let mut tasks = self.tasks.lock().unwrap();
            let entry = tasks.entry(task.to_string()).or_default();
            entry.count = current_count;
            entry.max_count
        };
        self.sink.update_task_progress(task, current_count, max_count);
    }

    pub fn update_task_stdout(&self, task: &str, line: &str) {
        self.sink.update_task_stdout(task, line);
    }

    pub fn update_task_stderr(&self, task: &str, line: &str) {
        self.sink.update_task_stderr(task, line);
    }

    pub fn update_task_output_files(&self, task: &str, paths: &[Utf8PathBuf]) {
        self.sink.update_task_output_files(task, paths);
    }

    /// Polled from the scheduler loop between stdout lines; must return
    /// promptly (within well under a second) so cancellation stays
    /// responsive.
    pub fn check_cancelled(&self, task: &str) -> bool {
        self.sink.check_cancelled(task)
    }

    pub fn elapsed_time(&self, task: &str) -> std::time::Duration {
        let tasks = self.tasks.lock().unwrap();
        match tasks.get(task) {
            Some(entry) => match (entry.start_time, entry.end_time) {
                (Some(start), Some(end)) => end.saturating_duration_since(start),
                (Some(start), None) => start.elapsed(),
                _ => std::time::Duration::ZERO,
            },
            None => std::time::Duration::ZERO,
        }
    }

    pub fn initialized_tasks(&self) -> Vec<String> {
        self.initialized_order.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sinks::RecordingSink;

    #[test]
    fn elapsed_time_is_zero_before_start() {
        let mgr = EventManager::new(RecordingSink::default());
        assert_eq!(mgr.elapsed_time("t0"), std::time::Duration::ZERO);
    }

    #[test]
    fn elapsed_time_uses_end_time_once_task_has_ended() {
        let mgr = EventManager::new(RecordingSink::default());
        mgr.start_task("t0");
        std::thread::sleep(std::time::Duration::from_millis(5));
        mgr.end_task("t0", TaskStatus::Success);
        assert!(mgr.elapsed_time("t0") >= std::time::Duration::from_millis(5));
    }

    #[test]
    fn initialize_task_records_order() {
        let mgr = EventManager::new(RecordingSink::default());
        mgr.initialize_task("a", 0, 10, TaskStatus::Initialized, None);
        mgr.initialize_task("b", 10, 10, TaskStatus::Success, None);
        assert_eq!(mgr.initialized_tasks(), vec!["a".to_string(), "b".to_string()]);
    }
}
