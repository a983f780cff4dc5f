use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("unknown task in job metadata: {0}")]
    UnknownTask(String),

    #[error(transparent)]
    Store(#[from] pipeliner_store::StoreError),

    #[error(transparent)]
    Config(#[from] pipeliner_core::ConfigError),

    #[error(transparent)]
    Runner(#[from] crate::runner::RunnerError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
