//! Loading a `PipelineManifest` YAML file into typed [`PipelineConfig`]s.

use crate::app_config::AppConfig;
use crate::error::ConfigError;
use crate::group::{ConfigOptionGroup, DatasetPort, DatasetPortsGroup};
use crate::option::ConfigOptionDict;
use crate::pipeline::PipelineConfig;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(rename = "PipelineManifest")]
    pipelines: BTreeMap<String, RawPipelineEntry>,
}

#[derive(Debug, Deserialize)]
struct RawPipelineEntry {
    path: Utf8PathBuf,
    #[serde(default)]
    parameters_config: BTreeMap<String, RawOption>,
    #[serde(default)]
    output_config: BTreeMap<String, RawOption>,
    #[serde(default)]
    dataset_pipeline_adapters: BTreeMap<String, RawAdapter>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    default: String,
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default)]
    env_variable: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAdapter {
    dataset_attribute: String,
    env_variable: String,
}

/// A loaded, read-only mapping of pipeline name to [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineManifest {
    pipelines: BTreeMap<String, PipelineConfig>,
}

impl PipelineManifest {
    /// Loads the manifest, resolving each entry's relative `path` against
    /// `app_config.plugin_path` when set, falling back to the manifest
    /// file's own directory otherwise. This replaces the source's
    /// process-global plugin path with a value passed in explicitly.
    pub fn load(path: &Utf8Path, app_config: &AppConfig) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let raw: RawManifest = serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?;

        let manifest_dir = path.parent().unwrap_or(Utf8Path::new("."));
        let base_dir = app_config.plugin_path.as_deref().unwrap_or(manifest_dir);
        let mut pipelines = BTreeMap::new();
        for (name, entry) in raw.pipelines {
            let template_path = if entry.path.is_absolute() {
                entry.path.clone()
            } else {
                base_dir.join(&entry.path)
            };

            let parameters = ConfigOptionGroup::parameters(
                entry
                    .parameters_config
                    .into_iter()
                    .map(|(n, o)| to_dict(n, o))
                    .collect(),
            )?;
            let outputs = ConfigOptionGroup::outputs(
                entry
                    .output_config
                    .into_iter()
                    .map(|(n, o)| to_dict(n, o))
                    .collect(),
            )?;
            let ports = DatasetPortsGroup::new(
                entry
                    .dataset_pipeline_adapters
                    .into_values()
                    .map(|a| DatasetPort {
                        dataset_attribute: a.dataset_attribute,
                        env_variable: a.env_variable,
                    })
                    .collect(),
            );

            let pipeline = PipelineConfig::new(name.clone(), template_path, parameters, outputs, ports)?;
            pipelines.insert(name, pipeline);
        }

        Ok(Self { pipelines })
    }

    pub fn get(&self, name: &str) -> Result<&PipelineConfig, ConfigError> {
        self.pipelines
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPipeline(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

fn to_dict(name: String, raw: RawOption) -> ConfigOptionDict {
    ConfigOptionDict {
        name,
        value: None,
        locked: false,
        default: raw.default,
        type_tag: raw.type_tag,
        env_variable: raw.env_variable,
        description: raw.description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_manifest_with_optional_groups_absent() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("t.pipe");
        std::fs::write(&template_path, "config foo\n").unwrap();

        let manifest_path = dir.path().join("manifest.yaml");
        let mut f = std::fs::File::create(&manifest_path).unwrap();
        writeln!(
            f,
            "PipelineManifest:\n  demo:\n    path: t.pipe\n"
        )
        .unwrap();

        let manifest =
            PipelineManifest::load(Utf8Path::from_path(&manifest_path).unwrap(), &AppConfig::default()).unwrap();
        let pipeline = manifest.get("demo").unwrap();
        assert!(pipeline.parameters.is_empty());
        assert!(pipeline.outputs.is_empty());
        assert!(pipeline.dataset_ports.is_empty());
    }

    #[test]
    fn unknown_pipeline_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("t.pipe");
        std::fs::write(&template_path, "config foo\n").unwrap();
        let manifest_path = dir.path().join("manifest.yaml");
        std::fs::write(&manifest_path, "PipelineManifest:\n  demo:\n    path: t.pipe\n").unwrap();

        let manifest =
            PipelineManifest::load(Utf8Path::from_path(&manifest_path).unwrap(), &AppConfig::default()).unwrap();
        assert!(matches!(
            manifest.get("nope"),
            Err(ConfigError::UnknownPipeline(_))
        ));
    }

    #[test]
    fn relative_template_path_resolves_against_plugin_path_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = Utf8PathBuf::from_path_buf(dir.path().join("plugins")).unwrap();
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("t.pipe"), "config foo\n").unwrap();

        // The manifest lives somewhere else entirely; without a plugin_path
        // override, resolving "t.pipe" against the manifest's own directory
        // would fail to find it.
        let manifest_path = Utf8PathBuf::from_path_buf(dir.path().join("manifest.yaml")).unwrap();
        std::fs::write(&manifest_path, "PipelineManifest:\n  demo:\n    path: t.pipe\n").unwrap();

        let app_config = AppConfig {
            plugin_path: Some(plugin_dir.clone()),
            ..AppConfig::default()
        };
        let manifest = PipelineManifest::load(&manifest_path, &app_config).unwrap();
        let pipeline = manifest.get("demo").unwrap();
        assert_eq!(pipeline.template_path, plugin_dir.join("t.pipe"));
    }
}
