//! Pipeline template compilation.
//!
//! `kwiver runner`'s pipe-config format has no env-variable injection and its
//! `-s` flag creates new blocks instead of patching settings in place, so a
//! pipeline is compiled by textually replacing `$ENV{}` placeholders and
//! `relativepath` attributes before it is handed to the runner.

pub mod error;

pub use error::CompileError;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ENV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$ENV\{([^}]*)\}").unwrap());
static RELPATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)relativepath.*=\s*(.*)$").unwrap());
static RELPATH_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"relativepath\s*").unwrap());

/// Compile a pipeline template's text against an environment.
///
/// Unknown `$ENV{NAME}` placeholders are left verbatim and logged rather than
/// failing the compile; `kwiver runner` configs routinely reference names no
/// particular run supplies.
pub fn compile_pipeline(template: &str, directory: &Utf8Path, env: &HashMap<String, String>) -> String {
    let mut content = template.to_string();

    for caps in ENV_RE.captures_iter(template) {
        let name = &caps[1];
        if !env.contains_key(name) {
            tracing::warn!(env_var = name, "pipeline references unset $ENV{{}} variable");
        }
    }

    for (k, v) in env {
        let needle = format!("$ENV{{{k}}}");
        content = content.replace(&needle, v);
    }

    let relative_paths: Vec<String> = {
        let mut seen = std::collections::HashSet::new();
        RELPATH_RE
            .captures_iter(&content)
            .map(|c| c[1].to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect()
    };

    for relative in relative_paths {
        let absolute = lexically_normalize(&directory.join(&relative));
        content = content.replace(&relative, absolute.as_str());
    }

    RELPATH_TOKEN_RE.replace_all(&content, "").into_owned()
}

/// Compile output-filename patterns: substitute `[TIMESTAMP]`, join onto
/// `base`, and normalise the result.
pub fn compile_output_filenames(
    output_filenames: &HashMap<String, String>,
    base: &Utf8Path,
    timestamp: DateTime<Utc>,
) -> HashMap<String, String> {
    let timestr = timestamp.format("%Y%m%d-%H%M%S").to_string();
    output_filenames
        .iter()
        .map(|(k, v)| {
            let substituted = v.replace("[TIMESTAMP]", &timestr);
            let joined = base.join(substituted);
            (k.clone(), lexically_normalize(&joined).to_string())
        })
        .collect()
}

/// Resolve `.` and `..` segments without touching the filesystem.
fn lexically_normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out: Vec<&str> = Vec::new();
    for component in path.as_str().split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|c| *c != "..") {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            c => out.push(c),
        }
    }
    let joined = out.join("/");
    if path.is_absolute() {
        Utf8PathBuf::from(format!("/{joined}"))
    } else {
        Utf8PathBuf::from(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn substitutes_known_env_vars_and_leaves_unknown() {
        let template = "threshold = $ENV{THRESH}\nother = $ENV{MISSING}\n";
        let mut env = HashMap::new();
        env.insert("THRESH".to_string(), "0.5".to_string());
        let out = compile_pipeline(template, Utf8Path::new("/pipelines/demo"), &env);
        assert!(out.contains("threshold = 0.5"));
        assert!(out.contains("other = $ENV{MISSING}"));
    }

    #[test]
    fn absolutizes_relativepath_and_strips_token() {
        let template = "relativepath input = sub/model.pt\n";
        let out = compile_pipeline(template, Utf8Path::new("/pipelines/demo"), &HashMap::new());
        assert_eq!(out, "input = /pipelines/demo/sub/model.pt\n");
    }

    #[test]
    fn compile_is_idempotent_with_no_env_substrings_in_values() {
        let template = "relativepath input = sub/model.pt\n";
        let once = compile_pipeline(template, Utf8Path::new("/pipelines/demo"), &HashMap::new());
        let twice = compile_pipeline(&once, Utf8Path::new("/pipelines/demo"), &HashMap::new());
        assert_eq!(once, twice);
    }

    #[test]
    fn output_filenames_substitute_timestamp_and_normalize() {
        let mut outputs = HashMap::new();
        outputs.insert("det".to_string(), "./out/[TIMESTAMP]-det.csv".to_string());
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let result = compile_output_filenames(&outputs, Utf8Path::new("/job/outputs_pending"), t);
        assert_eq!(
            result.get("det").unwrap(),
            "/job/outputs_pending/out/20240102-030405-det.csv"
        );
    }

    #[test]
    fn compile_output_filenames_is_deterministic() {
        let mut outputs = HashMap::new();
        outputs.insert("det".to_string(), "[TIMESTAMP]-det.csv".to_string());
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let a = compile_output_filenames(&outputs, Utf8Path::new("/job"), t);
        let b = compile_output_filenames(&outputs, Utf8Path::new("/job"), t);
        assert_eq!(a, b);
    }
}
