//! The collaborator-specific half of the `EventManager` contract.

use camino::Utf8PathBuf;
use pipeliner_store::TaskStatus;

/// Hooks a concrete collaborator (a console logger, a UI, a test recorder)
/// implements. [`crate::EventManager`] calls these after updating its own
/// shared bookkeeping, so a sink never needs to track status/counts itself.
pub trait EventSink: Send + Sync {
    fn initialize_task(
        &self,
        task: &str,
        count: usize,
        max_count: usize,
        status: TaskStatus,
        outputs: Option<&[Utf8PathBuf]>,
    );

    fn start_task(&self, task: &str);

    fn end_task(&self, task: &str, status: TaskStatus);

    fn update_task_progress(&self, task: &str, current_count: usize, max_count: usize);

    fn update_task_stdout(&self, task: &str, line: &str);

    fn update_task_stderr(&self, task: &str, line: &str);

    fn update_task_output_files(&self, task: &str, paths: &[Utf8PathBuf]);

    /// Cooperative cancellation check, polled between stdout lines. Sinks
    /// that never cancel can accept the default.
    fn check_cancelled(&self, _task: &str) -> bool {
        false
    }
}
