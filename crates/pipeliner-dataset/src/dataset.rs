//! The dataset read model the scheduler and compiler operate on.

use crate::error::DatasetManifestError;
use crate::image_list::ImageList;
use camino::Utf8PathBuf;
use pipeliner_core::DatasetAttributeSource;
use serde::{Deserialize, Serialize};

pub const ATTR_THERMAL_IMAGE_LIST: &str = "thermal_image_list";
pub const ATTR_COLOR_IMAGE_LIST: &str = "color_image_list";
pub const ATTR_TRANSFORMATION_FILE: &str = "transformation_file";

/// A single dataset: a name plus up to three optional attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VIAMEDataset {
    pub name: String,
    #[serde(default)]
    pub thermal_image_list: Option<Utf8PathBuf>,
    #[serde(default)]
    pub color_image_list: Option<Utf8PathBuf>,
    #[serde(default)]
    pub transformation_file: Option<Utf8PathBuf>,
}

impl VIAMEDataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thermal_image_list: None,
            color_image_list: None,
            transformation_file: None,
        }
    }

    pub fn get(&self, attribute: &str) -> Option<String> {
        match attribute {
            ATTR_THERMAL_IMAGE_LIST => self.thermal_image_list.as_ref().map(|p| p.to_string()),
            ATTR_COLOR_IMAGE_LIST => self.color_image_list.as_ref().map(|p| p.to_string()),
            ATTR_TRANSFORMATION_FILE => self.transformation_file.as_ref().map(|p| p.to_string()),
            _ => None,
        }
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.get(attribute).is_some()
    }

    pub fn thermal_images(&self) -> Result<Option<ImageList>, DatasetManifestError> {
        self.thermal_image_list
            .as_deref()
            .map(ImageList::load)
            .transpose()
    }

    pub fn color_images(&self) -> Result<Option<ImageList>, DatasetManifestError> {
        self.color_image_list
            .as_deref()
            .map(ImageList::load)
            .transpose()
    }

    pub fn thermal_image_count(&self) -> usize {
        self.thermal_image_list
            .as_deref()
            .map(ImageList::count_lines)
            .unwrap_or(0)
    }

    pub fn color_image_count(&self) -> usize {
        self.color_image_list
            .as_deref()
            .map(ImageList::count_lines)
            .unwrap_or(0)
    }

    /// `max(thermal_image_count, color_image_count)`: the denominator the
    /// scheduler reports task progress against.
    pub fn max_image_count(&self) -> usize {
        self.thermal_image_count().max(self.color_image_count())
    }

    /// The dataset name transformed into a filesystem- and task-key-safe
    /// form: non-alphanumeric, non-dash characters become `_`, and any
    /// trailing `_` is trimmed.
    pub fn filename_friendly_name(&self) -> String {
        let mapped: String = self
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        mapped.trim_end_matches('_').to_string()
    }
}

impl DatasetAttributeSource for VIAMEDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, attribute: &str) -> Option<String> {
        self.get(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_friendly_name_replaces_and_trims() {
        let ds = VIAMEDataset::new("Kotz 2019/fl04 (cent)_");
        assert_eq!(ds.filename_friendly_name(), "Kotz_2019_fl04__cent");
    }

    #[test]
    fn filename_friendly_name_keeps_dashes() {
        let ds = VIAMEDataset::new("a-b-c");
        assert_eq!(ds.filename_friendly_name(), "a-b-c");
    }

    #[test]
    fn get_returns_none_for_unset_attribute() {
        let ds = VIAMEDataset::new("d");
        assert_eq!(ds.get(ATTR_COLOR_IMAGE_LIST), None);
        assert!(!ds.contains(ATTR_COLOR_IMAGE_LIST));
    }
}
