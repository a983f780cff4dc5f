//! Moving output artifacts between `outputs_pending/`, `outputs_success/`,
//! and `outputs_error/` as a task's outcome is decided.

use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;

/// Move each existing path in `paths` into `dest_dir`, preserving its file
/// name. Paths that no longer exist are skipped silently; a rename failure
/// is logged and the path is left where it was.
pub fn move_existing(paths: &[Utf8PathBuf], dest_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut moved = Vec::new();
    for path in paths {
        if !path.exists() {
            continue;
        }
        let Some(name) = path.file_name() else { continue };
        let dest = dest_dir.join(name);
        match std::fs::rename(path, &dest) {
            Ok(()) => moved.push(dest),
            Err(source) => tracing::warn!(%path, %dest, %source, "failed to move output file"),
        }
    }
    moved
}

/// As [`move_existing`], retrying files still present after each pass. Used
/// only on the cancelled/kill-all path, where a reader may hold a file open
/// briefly after the child is killed.
pub async fn move_existing_with_retry(
    paths: &[Utf8PathBuf],
    dest_dir: &Utf8Path,
    attempts: u32,
    interval: Duration,
) -> Vec<Utf8PathBuf> {
    let mut moved = Vec::new();
    let mut remaining: Vec<Utf8PathBuf> = paths.to_vec();
    for attempt in 0..attempts {
        remaining.retain(|p| p.exists());
        if remaining.is_empty() {
            break;
        }
        moved.extend(move_existing(&remaining, dest_dir));
        remaining.retain(|p| p.exists());
        if remaining.is_empty() {
            break;
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    moved
}

/// Move every file directly under `pending_dir` into `error_dir`. Used by
/// kill-all, which does not track per-task output paths for every remaining
/// task individually.
pub fn sweep_pending_to_error(pending_dir: &Utf8Path, error_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut moved = Vec::new();
    let Ok(entries) = std::fs::read_dir(pending_dir) else {
        return moved;
    };
    for entry in entries.flatten() {
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        let Some(name) = path.file_name() else { continue };
        let dest = error_dir.join(name);
        if std::fs::rename(&path, &dest).is_ok() {
            moved.push(dest);
        }
    }
    moved
}

/// Best-effort safety net: on drop, moves any of `paths` still present to
/// `error_dir`. Armed for the lifetime of one task's run so a panic between
/// start and the normal outcome-classification cleanup does not strand
/// output files in `outputs_pending/`. Idempotent: once the normal path has
/// already relocated a file, `move_existing` finds nothing left to do.
pub struct PendingOutputsGuard {
    paths: Vec<Utf8PathBuf>,
    error_dir: Utf8PathBuf,
}

impl PendingOutputsGuard {
    pub fn new(paths: Vec<Utf8PathBuf>, error_dir: Utf8PathBuf) -> Self {
        Self { paths, error_dir }
    }
}

impl Drop for PendingOutputsGuard {
    fn drop(&mut self) {
        move_existing(&self.paths, &self.error_dir);
    }
}
