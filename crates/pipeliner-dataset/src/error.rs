//! Errors raised by dataset manifest collaborators.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetManifestError {
    #[error("dataset manifest file not found: {0}")]
    DatasetFileNotFound(Utf8PathBuf),

    #[error("duplicate dataset name: {0}")]
    DuplicateDatasetName(String),

    #[error("image list for dataset '{dataset}' references a missing image: {image}")]
    ImageListMissingImage { dataset: String, image: Utf8PathBuf },

    #[error("no manifest parser registered for format: {0}")]
    ParserNotFound(String),

    #[error("dataset '{0}' has no image list configured")]
    NoImageList(String),

    #[error("dataset entry is missing a name")]
    MissingDatasetName,

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),
}
