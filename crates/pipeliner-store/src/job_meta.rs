//! `JobMeta`: per-task compiled-pipeline and dataset/output snapshots, plus
//! the `create_job`/`load_job` entry points that tie it to [`crate::JobState`].

use crate::error::StoreError;
use crate::job_state::JobState;
use crate::json_store::JsonStore;
use crate::layout::{self, JOB_DIRECTORIES};
use crate::task::{TaskKey, TaskMeta};
use camino::{Utf8Path, Utf8PathBuf};
use pipeliner_core::{AppConfig, ConfigOptionGroup, PipelineConfig};
use pipeliner_dataset::VIAMEDataset;
use std::collections::HashMap;
use std::fs;

/// `[DATASET]` macro token substituted into an output option's default
/// pattern when a job is created, one expansion per task.
const DATASET_TOKEN: &str = "[DATASET]";

/// Snapshot of a `PipelineConfig` written to `pipelines_meta.json`. Only the
/// parts a resumed job needs to identify itself are kept; the compiled
/// pipelines and per-task output snapshots live in `datasets_meta.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct PipelineSnapshot {
    pub name: String,
    pub template_path: Utf8PathBuf,
}

/// The `meta/pipelines_meta.json` + `meta/datasets_meta.json` stores for one
/// job directory.
pub struct JobMeta {
    root_dir: Utf8PathBuf,
    pipeline_store: JsonStore<PipelineSnapshot>,
    dataset_store: JsonStore<HashMap<TaskKey, TaskMeta>>,
}

impl JobMeta {
    fn open(
        root_dir: &Utf8Path,
    ) -> Result<(JsonStore<PipelineSnapshot>, JsonStore<HashMap<TaskKey, TaskMeta>>), StoreError> {
        let pipe_path = layout::pipeline_meta_json_path(root_dir);
        let ds_path = layout::datasets_meta_json_path(root_dir);
        let pipe_store = if pipe_path.exists() {
            JsonStore::load(pipe_path)?
        } else {
            JsonStore::create(pipe_path, PipelineSnapshot::default())?
        };
        let ds_store = if ds_path.exists() {
            JsonStore::load(ds_path)?
        } else {
            JsonStore::create(ds_path, HashMap::new())?
        };
        Ok((pipe_store, ds_store))
    }

    /// Compile one `.pipe` file and output snapshot per dataset, writing both
    /// metadata stores. Returns the allocated task keys, sorted.
    ///
    /// `app_config.plugin_path` re-anchors `pipeline.template_path` when it
    /// is relative, the same resolution `PipelineManifest::load` applies; a
    /// `PipelineConfig` built directly (rather than loaded from a manifest)
    /// may still carry a relative path here.
    fn create_meta(
        root_dir: &Utf8Path,
        pipeline: &PipelineConfig,
        datasets: &[VIAMEDataset],
        app_config: &AppConfig,
    ) -> Result<Vec<TaskKey>, StoreError> {
        let (mut pipe_store, mut ds_store) = Self::open(root_dir)?;
        let template_path = if pipeline.template_path.is_absolute() {
            pipeline.template_path.clone()
        } else {
            app_config
                .plugin_path
                .as_deref()
                .unwrap_or(Utf8Path::new("."))
                .join(&pipeline.template_path)
        };
        pipe_store.update(|snap| {
            snap.name = pipeline.name.clone();
            snap.template_path = template_path.clone();
        })?;

        let template = fs::read_to_string(&template_path).map_err(|e| StoreError::Io {
            path: template_path.clone(),
            source: e,
        })?;

        let mut task_keys = Vec::with_capacity(datasets.len());
        let mut entries = HashMap::with_capacity(datasets.len());

        for dataset in datasets {
            let task_key = dataset.filename_friendly_name();
            let compiled_fp =
                layout::pipelines_dir(root_dir).join(format!("{task_key}-{}.pipe", pipeline.name));

            let mut output_config = pipeline.outputs.to_dict();
            for dict in output_config.values_mut() {
                let expanded = dict.default.replace(DATASET_TOKEN, &task_key);
                // Normalise through the option's own type, same as a manual
                // set_value would: output types store their value with the
                // required extension stripped, re-attached later by the
                // scheduler's filename pass.
                let normalised = pipeliner_core::parse_type(&dict.type_tag)
                    .validate(&expanded)
                    .unwrap_or(expanded);
                dict.value = Some(normalised);
                dict.locked = true;
            }

            let mut env = pipeline.get_parameter_env_ports();
            env.extend(pipeline.get_pipeline_dataset_environment(dataset, false)?);

            let compiled = pipeliner_compiler::compile_pipeline(&template, &pipeline.directory, &env);
            fs::write(&compiled_fp, compiled).map_err(|e| StoreError::Io {
                path: compiled_fp.clone(),
                source: e,
            })?;

            let relpath = compiled_fp
                .strip_prefix(root_dir)
                .unwrap_or(&compiled_fp)
                .to_path_buf();

            entries.insert(
                task_key.clone(),
                TaskMeta {
                    compiled_fp: relpath.to_string(),
                    dataset: dataset.clone(),
                    output_config,
                },
            );
            task_keys.push(task_key);
        }

        ds_store.update(|data| *data = entries)?;
        task_keys.sort();
        Ok(task_keys)
    }

    fn load(root_dir: &Utf8Path) -> Result<Self, StoreError> {
        let (pipeline_store, dataset_store) = Self::open(root_dir)?;
        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            pipeline_store,
            dataset_store,
        })
    }

    pub fn root_dir(&self) -> &Utf8Path {
        &self.root_dir
    }

    pub fn keys(&self) -> Vec<TaskKey> {
        self.dataset_store.data().keys().cloned().collect()
    }

    pub fn get(&self, task_key: &str) -> Option<&TaskMeta> {
        self.dataset_store.data().get(task_key)
    }

    /// The task's compiled pipeline, as an absolute path.
    pub fn compiled_pipeline_path(&self, task_key: &str) -> Option<Utf8PathBuf> {
        self.get(task_key).map(|m| self.root_dir.join(&m.compiled_fp))
    }

    /// Reconstruct the task's locked output option group (one option per
    /// declared output, each already macro-expanded and frozen).
    pub fn output_group(
        &self,
        task_key: &str,
    ) -> Option<Result<ConfigOptionGroup, pipeliner_core::ConfigError>> {
        self.get(task_key)
            .map(|m| ConfigOptionGroup::outputs(m.output_config.values().cloned().collect()))
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_store.data().name
    }
}

/// Create a new job directory: layout, compiled pipelines, metadata stores,
/// and task-status state. Rolls the whole directory back on any failure
/// after it starts creating files.
pub fn create_job(
    root_dir: &Utf8Path,
    pipeline: &PipelineConfig,
    datasets: &[VIAMEDataset],
    force: bool,
    app_config: &AppConfig,
) -> Result<(JobState, JobMeta), StoreError> {
    if root_dir.exists() {
        if force {
            fs::remove_dir_all(root_dir).map_err(|e| StoreError::Io {
                path: root_dir.to_path_buf(),
                source: e,
            })?;
        } else {
            return Err(StoreError::AlreadyExists(root_dir.to_path_buf()));
        }
    }

    let result = (|| -> Result<(JobState, JobMeta), StoreError> {
        for make_dir in JOB_DIRECTORIES {
            let dir = make_dir(root_dir);
            fs::create_dir_all(&dir).map_err(|e| StoreError::Io { path: dir, source: e })?;
        }

        let task_keys = JobMeta::create_meta(root_dir, pipeline, datasets, app_config)?;
        let job_state = JobState::create(root_dir, task_keys)?;
        let job_meta = JobMeta::load(root_dir)?;
        Ok((job_state, job_meta))
    })();

    if result.is_err() {
        let _ = fs::remove_dir_all(root_dir);
    }
    result
}

/// Load an already-created job's state and metadata.
pub fn load_job(root_dir: &Utf8Path) -> Result<(JobState, JobMeta), StoreError> {
    let job_state = JobState::load(root_dir)?;
    let job_meta = JobMeta::load(root_dir)?;
    Ok((job_state, job_meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeliner_core::{ConfigOptionDict, ConfigOptionGroup, DatasetPort, DatasetPortsGroup};

    fn dict(name: &str, default: &str, type_tag: &str, env: Option<&str>) -> ConfigOptionDict {
        ConfigOptionDict {
            name: name.to_string(),
            value: None,
            locked: false,
            default: default.to_string(),
            type_tag: type_tag.to_string(),
            env_variable: env.map(str::to_string),
            description: None,
        }
    }

    fn sample_pipeline(dir: &Utf8Path) -> PipelineConfig {
        let template_path = dir.join("t.pipe");
        fs::write(&template_path, "relativepath model = weights.pt\nthresh = $ENV{THRESH}\n").unwrap();
        let parameters = ConfigOptionGroup::parameters(vec![dict("thresh", "0.5", "float", Some("THRESH"))]).unwrap();
        let outputs = ConfigOptionGroup::outputs(vec![dict(
            "detections",
            "[DATASET]-dets.csv",
            "output_detections_file",
            Some("DETECTIONS_CSV"),
        )])
        .unwrap();
        let ports = DatasetPortsGroup::new(vec![DatasetPort {
            dataset_attribute: "color_image_list".to_string(),
            env_variable: "COLOR".to_string(),
        }]);
        PipelineConfig::new("demo", template_path, parameters, outputs, ports).unwrap()
    }

    fn sample_dataset(dir: &Utf8Path, name: &str) -> VIAMEDataset {
        let list_path = dir.join(format!("{name}.txt"));
        fs::write(&list_path, "a.png\nb.png\n").unwrap();
        let mut ds = VIAMEDataset::new(name);
        ds.color_image_list = Some(list_path);
        ds
    }

    #[test]
    fn create_job_writes_compiled_pipelines_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().join("job");
        let tmpl_dir = Utf8Path::from_path(dir.path()).unwrap();
        let pipeline = sample_pipeline(tmpl_dir);
        let datasets = vec![sample_dataset(tmpl_dir, "Fl-04 (cent)")];

        let (state, meta) = create_job(&root, &pipeline, &datasets, false, &AppConfig::default()).unwrap();
        assert_eq!(state.tasks().len(), 1);
        let key = &state.tasks()[0];
        assert_eq!(key, "Fl-04_cent");

        let compiled_path = meta.compiled_pipeline_path(key).unwrap();
        assert!(compiled_path.exists());
        let content = fs::read_to_string(compiled_path).unwrap();
        assert!(content.contains("thresh = 0.5"));
        assert!(!content.contains("relativepath"));

        let outputs = meta.output_group(key).unwrap().unwrap();
        let det = outputs.get("detections").unwrap();
        assert_eq!(det.value(), "Fl-04_cent-dets");
        assert!(det.is_locked());
    }

    #[test]
    fn create_job_rejects_existing_directory_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().join("job");
        let tmpl_dir = Utf8Path::from_path(dir.path()).unwrap();
        let pipeline = sample_pipeline(tmpl_dir);
        let datasets = vec![sample_dataset(tmpl_dir, "d1")];

        create_job(&root, &pipeline, &datasets, false, &AppConfig::default()).unwrap();
        let err = create_job(&root, &pipeline, &datasets, false, &AppConfig::default());
        assert!(matches!(err, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn create_job_rolls_back_on_missing_port() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().join("job");
        let tmpl_dir = Utf8Path::from_path(dir.path()).unwrap();
        let pipeline = sample_pipeline(tmpl_dir);
        // dataset lacking the required `color_image_list` port
        let datasets = vec![VIAMEDataset::new("no-port")];

        let err = create_job(&root, &pipeline, &datasets, false, &AppConfig::default());
        assert!(err.is_err());
        assert!(!root.exists());
    }

    #[test]
    fn load_job_round_trips_create_job() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().join("job");
        let tmpl_dir = Utf8Path::from_path(dir.path()).unwrap();
        let pipeline = sample_pipeline(tmpl_dir);
        let datasets = vec![sample_dataset(tmpl_dir, "d1"), sample_dataset(tmpl_dir, "d2")];

        create_job(&root, &pipeline, &datasets, false, &AppConfig::default()).unwrap();
        let (state, meta) = load_job(&root).unwrap();
        assert_eq!(state.tasks().len(), 2);
        assert_eq!(meta.keys().len(), 2);
    }
}
