//! The dataset surface: a thin read model plus the manifest-parser contract.

pub mod dataset;
pub mod error;
pub mod image_list;
pub mod manifest;

pub use dataset::{
    VIAMEDataset, ATTR_COLOR_IMAGE_LIST, ATTR_THERMAL_IMAGE_LIST, ATTR_TRANSFORMATION_FILE,
};
pub use error::DatasetManifestError;
pub use image_list::ImageList;
pub use manifest::DatasetManifest;
