//! CLI argument parsing and the JSON dataset-manifest collaborator used by
//! the `pipeliner` binary.

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use pipeliner_dataset::{DatasetManifest, DatasetManifestError, VIAMEDataset};
use serde::de::{MapAccess, Visitor};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "pipeliner")]
#[command(about = "Run VIAME detection-pipeline templates over datasets via kwiver runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (can be repeated: -v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a job directory from a pipeline + dataset manifest, without running it.
    Create {
        /// Job directory to create.
        job_dir: Utf8PathBuf,
        /// Pipeline manifest YAML (`PipelineManifest:` top-level key).
        #[arg(long)]
        pipeline_manifest: Utf8PathBuf,
        /// Name of the pipeline entry to run.
        #[arg(long)]
        pipeline: String,
        /// JSON dataset manifest (`{"name": {"color_image_list": ..., ...}}`).
        #[arg(long)]
        dataset_manifest: Utf8PathBuf,
        /// Dataset names to include; omit to include every dataset in the manifest.
        #[arg(long = "dataset")]
        datasets: Vec<String>,
        /// Remove an existing job directory at the same path first.
        #[arg(long)]
        force: bool,
        /// Directory relative template paths in the pipeline manifest resolve
        /// against; defaults to the pipeline manifest's own directory.
        #[arg(long)]
        plugin_path: Option<Utf8PathBuf>,
    },
    /// Create a job (as `create`) and run it to completion.
    Run {
        job_dir: Utf8PathBuf,
        #[arg(long)]
        pipeline_manifest: Utf8PathBuf,
        #[arg(long)]
        pipeline: String,
        #[arg(long)]
        dataset_manifest: Utf8PathBuf,
        #[arg(long = "dataset")]
        datasets: Vec<String>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        plugin_path: Option<Utf8PathBuf>,
        #[arg(long)]
        kwiver_setup_path: Option<Utf8PathBuf>,
        #[arg(long)]
        debug: bool,
    },
    /// Resume an already-created job directory to completion.
    Resume {
        job_dir: Utf8PathBuf,
        #[arg(long)]
        kwiver_setup_path: Option<Utf8PathBuf>,
        #[arg(long)]
        debug: bool,
    },
    /// Signal a `run`/`resume` process against this job directory to stop.
    ///
    /// Every task not yet complete ends `ERROR`, including whichever task was
    /// running when the signal arrived; see the scheduler's kill-all path.
    Cancel { job_dir: Utf8PathBuf },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to parse dataset manifest {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no running pipeliner process found for job directory {0}")]
    NoRunningProcess(Utf8PathBuf),
    #[error(transparent)]
    Dataset(#[from] DatasetManifestError),
}

/// A dataset manifest backed by a single JSON file mapping dataset name to
/// [`VIAMEDataset`]. The original system's CSV/INI manifest parsers are an
/// external collaborator out of this crate's scope; this is this CLI's own
/// minimal concrete implementation of the same [`DatasetManifest`] contract.
pub struct JsonDatasetManifest {
    datasets: BTreeMap<String, VIAMEDataset>,
}

/// Deserializes the manifest object entry-by-entry (rather than straight
/// into a `BTreeMap`) so a repeated dataset name is observed instead of the
/// second occurrence silently overwriting the first.
struct DedupVisitor<'a> {
    duplicate: &'a RefCell<Option<String>>,
}

impl<'de, 'a> Visitor<'de> for DedupVisitor<'a> {
    type Value = BTreeMap<String, VIAMEDataset>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object mapping dataset name to dataset")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut datasets = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, VIAMEDataset>()? {
            if datasets.insert(key.clone(), value).is_some() {
                *self.duplicate.borrow_mut() = Some(key);
            }
        }
        Ok(datasets)
    }
}

impl JsonDatasetManifest {
    pub fn load(path: &Utf8PathBuf) -> Result<Self, CliError> {
        if !path.exists() {
            return Err(CliError::Dataset(DatasetManifestError::DatasetFileNotFound(path.clone())));
        }
        let content = std::fs::read_to_string(path)?;

        let duplicate = RefCell::new(None);
        let mut de = serde_json::Deserializer::from_str(&content);
        let datasets: BTreeMap<String, VIAMEDataset> = de
            .deserialize_map(DedupVisitor { duplicate: &duplicate })
            .map_err(|source| CliError::Json { path: path.clone(), source })?;
        if let Some(name) = duplicate.into_inner() {
            return Err(CliError::Dataset(DatasetManifestError::DuplicateDatasetName(name)));
        }

        let manifest_dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        for dataset in datasets.values() {
            for image_list in [&dataset.color_image_list, &dataset.thermal_image_list].into_iter().flatten() {
                let resolved = if image_list.is_absolute() {
                    image_list.clone()
                } else {
                    manifest_dir.join(image_list)
                };
                if !resolved.exists() {
                    return Err(CliError::Dataset(DatasetManifestError::ImageListMissingImage {
                        dataset: dataset.name.clone(),
                        image: image_list.clone(),
                    }));
                }
            }
        }

        Ok(Self { datasets })
    }
}

impl DatasetManifest for JsonDatasetManifest {
    fn list_dataset_keys(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    fn get_dataset(&self, name: &str) -> Result<VIAMEDataset, DatasetManifestError> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| DatasetManifestError::DatasetNotFound(name.to_string()))
    }
}

/// The pid-file path `run`/`resume` writes so `cancel` can find the process.
pub fn pid_file_path(job_dir: &Utf8PathBuf) -> Utf8PathBuf {
    job_dir.join("meta").join("run.pid")
}
