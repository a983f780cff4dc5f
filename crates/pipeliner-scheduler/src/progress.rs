//! Tails an output image-list file and reports its line count as progress.
//!
//! `kwiver runner` has no progress protocol of its own; it writes one line
//! per processed image to the output image list it was configured with, so
//! progress is approximated by polling that file's length.

use crate::stop::StopSignal;
use camino::{Utf8Path, Utf8PathBuf};
use pipeliner_dataset::ImageList;
use pipeliner_events::{EventManager, EventSink};
use std::sync::Arc;
use std::time::Duration;

/// Polls `image_list_path` every `poll_freq` until `stop` fires, reporting
/// the line count to `manager` as `task`'s progress.
pub async fn run<S: EventSink>(
    stop: StopSignal,
    task: String,
    manager: Arc<EventManager<S>>,
    image_list_path: Utf8PathBuf,
    poll_freq: Duration,
) {
    loop {
        if stop.wait_for(poll_freq).await {
            return;
        }
        let count = ImageList::count_lines(&image_list_path);
        manager.update_task_progress(&task, count);
    }
}

/// A single synchronous poll, used for the final progress update once a task
/// has ended.
pub fn poll_once<S: EventSink>(manager: &EventManager<S>, task: &str, image_list_path: &Utf8Path) {
    let count = ImageList::count_lines(image_list_path);
    manager.update_task_progress(task, count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeliner_events::RecordingSink;
    use std::io::Write;

    #[tokio::test]
    async fn run_reports_progress_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = Utf8PathBuf::from_path_buf(dir.path().join("images.txt")).unwrap();
        std::fs::write(&list_path, "a.png\nb.png\n").unwrap();

        let manager = Arc::new(EventManager::new(RecordingSink::default()));
        let stop = StopSignal::new();
        let handle = tokio::spawn(run(
            stop.clone(),
            "t0".to_string(),
            Arc::clone(&manager),
            list_path.clone(),
            Duration::from_millis(5),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        stop.fire();
        handle.await.unwrap();

        let events = manager.sink().events();
        assert!(events.iter().any(|e| e.contains("update_task_progress(t0, 2, 0)")));
    }

    #[test]
    fn poll_once_reports_current_line_count() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = dir.path().join("images.txt");
        let mut f = std::fs::File::create(&list_path).unwrap();
        writeln!(f, "a.png").unwrap();

        let manager = EventManager::new(RecordingSink::default());
        poll_once(&manager, "t0", Utf8Path::from_path(&list_path).unwrap());
        assert_eq!(manager.sink().events(), vec!["update_task_progress(t0, 1, 0)"]);
    }
}
