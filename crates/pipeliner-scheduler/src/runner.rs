//! Spawns `kwiver runner` as a child process for one compiled pipeline.
//!
//! The wire format kwiver runner expects has no way to inject environment
//! variables or patch settings after the fact, so the pipeline compiler
//! (`pipeliner-compiler`) bakes everything in ahead of time; this module's
//! only job is building the right command line and handing the child its
//! environment, working directory, and `-s key=value` overrides.

use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to spawn kwiver runner: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Runner behaviour that is not per-task: whether to wrap the command in
/// `gdb --args`, and the shell script that sets up the kwiver environment.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub kwiver_setup_path: Option<Utf8PathBuf>,
    pub debug: bool,
}

/// One invocation of `kwiver runner` against a compiled pipeline.
pub struct KwiverRunner {
    pipeline_path: Utf8PathBuf,
    cwd: Utf8PathBuf,
    env: HashMap<String, String>,
    pipe_args: HashMap<String, String>,
    options: RunnerOptions,
}

impl KwiverRunner {
    pub fn new(
        pipeline_path: Utf8PathBuf,
        cwd: Utf8PathBuf,
        env: HashMap<String, String>,
        pipe_args: HashMap<String, String>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            pipeline_path,
            cwd,
            env,
            pipe_args,
            options,
        }
    }

    /// Spawn the child. Stdout and stderr are both piped; in this runner
    /// stderr is treated as part of the merged progress/log stream rather
    /// than kept separate, so callers should pump both.
    pub fn spawn(&self) -> Result<Child, RunnerError> {
        let mut command = self.build_command();
        command
            .current_dir(&self.cwd)
            .envs(&self.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command.spawn()?)
    }

    #[cfg(not(windows))]
    fn build_command(&self) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(self.shell_line());
        command
    }

    #[cfg(windows)]
    fn build_command(&self) -> Command {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(self.shell_line());
        command
    }

    #[cfg(not(windows))]
    fn shell_line(&self) -> String {
        let mut stages = Vec::new();
        if let Some(setup) = &self.options.kwiver_setup_path {
            stages.push(format!("source {}", shell_quote(setup.as_str())));
            stages.push("printenv".to_string());
        }
        let runner = if self.options.debug {
            "gdb --args kwiver runner"
        } else {
            "kwiver runner"
        };
        stages.push(format!("{runner} {}{}", shell_quote(self.pipeline_path.as_str()), self.pipe_args_suffix()));
        stages.join(" && ")
    }

    #[cfg(windows)]
    fn shell_line(&self) -> String {
        let mut stages = Vec::new();
        if let Some(setup) = &self.options.kwiver_setup_path {
            stages.push(format!("\"{}\"", setup.as_str()));
        }
        stages.push(format!(
            "kwiver.exe runner {}{}",
            self.pipeline_path.as_str(),
            self.pipe_args_suffix()
        ));
        stages.join(" && ")
    }

    fn pipe_args_suffix(&self) -> String {
        let mut keys: Vec<&String> = self.pipe_args.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| format!(" -s {k}={}", self.pipe_args[k]))
            .collect()
    }
}

#[cfg(not(windows))]
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Kill the child's process tree. On POSIX this signals the process group
/// directly; on Windows it shells out to `taskkill /F /T` so descendants
/// spawned by the shell wrapper are reaped too.
pub async fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: kill(2) with a valid pid and signal number is always safe.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
    #[cfg(windows)]
    {
        if let Some(pid) = child.id() {
            let _ = Command::new("taskkill")
                .args(["/F", "/T", "/PID", &pid.to_string()])
                .status()
                .await;
        }
    }
    child.kill().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_line_without_setup_script_is_bare_runner() {
        let runner = KwiverRunner::new(
            Utf8PathBuf::from("/job/pipelines/t0-demo.pipe"),
            Utf8PathBuf::from("/job"),
            HashMap::new(),
            HashMap::new(),
            RunnerOptions::default(),
        );
        #[cfg(not(windows))]
        assert_eq!(runner.shell_line(), "kwiver runner '/job/pipelines/t0-demo.pipe'");
    }

    #[test]
    fn shell_line_with_setup_sources_and_prints_env() {
        let runner = KwiverRunner::new(
            Utf8PathBuf::from("/job/t0.pipe"),
            Utf8PathBuf::from("/job"),
            HashMap::new(),
            HashMap::new(),
            RunnerOptions {
                kwiver_setup_path: Some(Utf8PathBuf::from("/opt/kwiver/setup.sh")),
                debug: false,
            },
        );
        #[cfg(not(windows))]
        assert_eq!(
            runner.shell_line(),
            "source '/opt/kwiver/setup.sh' && printenv && kwiver runner '/job/t0.pipe'"
        );
    }

    #[test]
    fn debug_flag_prefixes_gdb() {
        let runner = KwiverRunner::new(
            Utf8PathBuf::from("/job/t0.pipe"),
            Utf8PathBuf::from("/job"),
            HashMap::new(),
            HashMap::new(),
            RunnerOptions {
                kwiver_setup_path: None,
                debug: true,
            },
        );
        #[cfg(not(windows))]
        assert!(runner.shell_line().starts_with("gdb --args kwiver runner"));
    }

    #[test]
    fn pipe_args_are_appended_sorted_by_key() {
        let mut pipe_args = HashMap::new();
        pipe_args.insert("b".to_string(), "2".to_string());
        pipe_args.insert("a".to_string(), "1".to_string());
        let runner = KwiverRunner::new(
            Utf8PathBuf::from("/job/t0.pipe"),
            Utf8PathBuf::from("/job"),
            HashMap::new(),
            pipe_args,
            RunnerOptions::default(),
        );
        #[cfg(not(windows))]
        assert_eq!(
            runner.shell_line(),
            "kwiver runner '/job/t0.pipe' -s a=1 -s b=2"
        );
    }
}
