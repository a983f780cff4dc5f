//! An atomically-persisted JSON value: every mutation is written to a temp
//! file and renamed into place, so a crash never leaves a half-written store.
//!
//! Output is UTF-8, tab-indented, with sorted object keys (`serde_json`'s
//! `Map` is a `BTreeMap` unless the `preserve_order` feature is enabled, so
//! plain serialization already sorts keys; only the indent needs overriding).

use crate::error::StoreError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;

pub struct JsonStore<T> {
    path: Utf8PathBuf,
    data: T,
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    /// Create a new store, writing `data` immediately.
    pub fn create(path: Utf8PathBuf, data: T) -> Result<Self, StoreError> {
        let store = Self { path, data };
        store.write()?;
        Ok(store)
    }

    /// Load an existing store from disk.
    pub fn load(path: Utf8PathBuf) -> Result<Self, StoreError> {
        let content = fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        let data = serde_json::from_str(&content).map_err(|e| StoreError::Json {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path, data })
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Mutate the in-memory value and atomically persist the result.
    pub fn update<F: FnOnce(&mut T)>(&mut self, f: F) -> Result<(), StoreError> {
        f(&mut self.data);
        self.write()
    }

    fn write(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let content = to_pretty_tabbed(&self.data).map_err(|e| StoreError::Json {
            path: self.path.clone(),
            source: e,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| StoreError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }
}

fn to_pretty_tabbed<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf).expect("serde_json always emits valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct Sample {
        z: u32,
        a: u32,
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(&dir.path().join("s.json")).unwrap().to_path_buf();
        let store = JsonStore::create(path.clone(), Sample { z: 1, a: 2 }).unwrap();
        assert!(path.exists());

        let loaded = JsonStore::<Sample>::load(path).unwrap();
        assert_eq!(*loaded.data(), Sample { z: 1, a: 2 });
        let _ = store;
    }

    #[test]
    fn output_uses_tab_indent_and_sorted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(&dir.path().join("s.json")).unwrap().to_path_buf();
        JsonStore::create(path.clone(), Sample { z: 1, a: 2 }).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n\t\"a\""));
        let a_idx = content.find("\"a\"").unwrap();
        let z_idx = content.find("\"z\"").unwrap();
        assert!(a_idx < z_idx);
    }

    #[test]
    fn update_persists_mutation_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(&dir.path().join("s.json")).unwrap().to_path_buf();
        let mut store = JsonStore::create(path.clone(), Sample { z: 1, a: 2 }).unwrap();
        store.update(|s| s.a = 42).unwrap();
        assert!(!Utf8Path::new(&format!("{path}.tmp")).exists());

        let loaded = JsonStore::<Sample>::load(path).unwrap();
        assert_eq!(loaded.data().a, 42);
    }
}
