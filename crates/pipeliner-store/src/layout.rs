//! Job-directory layout: the fixed set of subdirectories and file paths
//! rooted at a job directory.

use camino::{Utf8Path, Utf8PathBuf};

pub fn meta_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("meta")
}

pub fn pipelines_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("pipelines")
}

pub fn logs_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("logs")
}

pub fn outputs_success_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("outputs_success")
}

pub fn outputs_error_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("outputs_error")
}

pub fn outputs_pending_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.join("outputs_pending")
}

pub fn job_state_json_path(root: &Utf8Path) -> Utf8PathBuf {
    meta_dir(root).join("job_state.json")
}

pub fn pipeline_meta_json_path(root: &Utf8Path) -> Utf8PathBuf {
    meta_dir(root).join("pipelines_meta.json")
}

pub fn datasets_meta_json_path(root: &Utf8Path) -> Utf8PathBuf {
    meta_dir(root).join("datasets_meta.json")
}

pub const JOB_DIRECTORIES: &[fn(&Utf8Path) -> Utf8PathBuf] = &[
    pipelines_dir,
    meta_dir,
    logs_dir,
    outputs_error_dir,
    outputs_success_dir,
    outputs_pending_dir,
];
