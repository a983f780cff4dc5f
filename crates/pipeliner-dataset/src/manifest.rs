//! The collaborator contract a dataset manifest parser must satisfy.
//!
//! Concrete parsers (CSV, INI, ...) are not implemented here; this crate only
//! defines the trait the scheduler and job store code against.

use crate::dataset::VIAMEDataset;
use crate::error::DatasetManifestError;

pub trait DatasetManifest {
    /// All dataset names in manifest order.
    fn list_dataset_keys(&self) -> Vec<String>;

    /// Dataset names containing `substring` (case-sensitive substring match).
    fn list_dataset_keys_txt(&self, substring: &str) -> Vec<String> {
        self.list_dataset_keys()
            .into_iter()
            .filter(|k| k.contains(substring))
            .collect()
    }

    fn get_dataset(&self, name: &str) -> Result<VIAMEDataset, DatasetManifestError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct StubManifest(BTreeMap<String, VIAMEDataset>);

    impl DatasetManifest for StubManifest {
        fn list_dataset_keys(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }

        fn get_dataset(&self, name: &str) -> Result<VIAMEDataset, DatasetManifestError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| DatasetManifestError::DatasetNotFound(name.to_string()))
        }
    }

    #[test]
    fn list_dataset_keys_txt_filters_by_substring() {
        let mut m = BTreeMap::new();
        m.insert("fl04-cent".to_string(), VIAMEDataset::new("fl04-cent"));
        m.insert("fl04-left".to_string(), VIAMEDataset::new("fl04-left"));
        m.insert("other".to_string(), VIAMEDataset::new("other"));
        let manifest = StubManifest(m);

        let mut matched = manifest.list_dataset_keys_txt("fl04");
        matched.sort();
        assert_eq!(matched, vec!["fl04-cent", "fl04-left"]);
    }
}
