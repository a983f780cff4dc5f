//! Explicit, threaded-through application configuration.
//!
//! The system this was modeled on resolved pipeline template paths against a
//! process-global plugin directory and a global user-settings object. Here
//! that is replaced by a plain value passed into job creation and the
//! scheduler, rather than read from ambient global state.

use camino::Utf8PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory pipeline templates are resolved relative to when a manifest
    /// entry's `path` is not already absolute.
    pub plugin_path: Option<Utf8PathBuf>,
    /// Shell script sourced before invoking `kwiver runner` (sets up
    /// `LD_LIBRARY_PATH`, `KWIVER_PLUGIN_PATH`, etc).
    pub kwiver_setup_path: Option<Utf8PathBuf>,
    /// Seconds between progress polls of a task's output image list.
    pub progress_poll_freq_secs: u64,
    /// Prefix the runner command with `gdb --args` for interactive debugging.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plugin_path: None,
            kwiver_setup_path: None,
            progress_poll_freq_secs: 5,
            debug: false,
        }
    }
}
