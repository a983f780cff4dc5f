use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] pipeliner_core::ConfigError),

    #[error(transparent)]
    Dataset(#[from] pipeliner_dataset::DatasetManifestError),

    #[error("job directory {0} already exists")]
    AlreadyExists(Utf8PathBuf),

    #[error("job already initialized at {0}")]
    AlreadyInitialized(Utf8PathBuf),

    #[error("no pipelines/datasets provided for job at {0}")]
    NoTasks(Utf8PathBuf),

    #[error("job state file missing or not initialized: {0}")]
    NotInitialized(Utf8PathBuf),

    #[error("unknown task: {0}")]
    UnknownTask(String),
}
