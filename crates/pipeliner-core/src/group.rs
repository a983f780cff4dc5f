//! Option groups: an ordered, named set of [`ConfigOption`]s with an optional
//! type whitelist, plus the dataset-port adapter group.

use crate::error::ConfigError;
use crate::option::{ConfigOption, ConfigOptionDict};
use std::collections::HashMap;

/// The `parameters_config` / `output_config` sections of a manifest entry.
#[derive(Debug, Clone)]
pub struct ConfigOptionGroup {
    pub group_name: String,
    options: Vec<ConfigOption>,
    /// `None` means any type tag is accepted (the parameters group).
    allowed_types: Option<&'static [&'static str]>,
}

pub const OUTPUT_GROUP_NAME: &str = "output_config";
pub const PARAMETERS_GROUP_NAME: &str = "parameters_config";
const OUTPUT_ALLOWED_TYPES: &[&str] = &["output_image_list", "output_detections_file"];

impl ConfigOptionGroup {
    pub fn parameters(options: Vec<ConfigOptionDict>) -> Result<Self, ConfigError> {
        Self::build(PARAMETERS_GROUP_NAME, options, None)
    }

    pub fn outputs(options: Vec<ConfigOptionDict>) -> Result<Self, ConfigError> {
        Self::build(OUTPUT_GROUP_NAME, options, Some(OUTPUT_ALLOWED_TYPES))
    }

    fn build(
        group_name: &str,
        dicts: Vec<ConfigOptionDict>,
        allowed_types: Option<&'static [&'static str]>,
    ) -> Result<Self, ConfigError> {
        let mut options = Vec::with_capacity(dicts.len());
        for dict in dicts {
            if let Some(allowed) = allowed_types {
                let tag = dict.type_tag.as_str();
                if !allowed.iter().any(|a| tag.starts_with(a)) {
                    return Err(ConfigError::InvalidOptionType {
                        group: group_name.to_string(),
                        name: dict.name,
                        type_tag: dict.type_tag,
                    });
                }
            }
            options.push(ConfigOption::from_dict(dict)?);
        }
        Ok(Self {
            group_name: group_name.to_string(),
            options,
            allowed_types,
        })
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ConfigOption> {
        self.options.iter_mut().find(|o| o.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigOption> {
        self.options.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConfigOption> {
        self.options.iter_mut()
    }

    /// Every option's `(env_variable, value)` pair, for options wired to an env var.
    pub fn get_env_ports(&self) -> HashMap<String, String> {
        self.options.iter().filter_map(|o| o.get_env()).collect()
    }

    pub fn reset_one(&mut self, name: &str) {
        if let Some(opt) = self.get_mut(name) {
            opt.reset();
        }
    }

    pub fn reset_all(&mut self) {
        for opt in self.options.iter_mut() {
            opt.reset();
        }
    }

    pub fn to_dict(&self) -> HashMap<String, ConfigOptionDict> {
        self.options
            .iter()
            .map(|o| (o.name.clone(), o.to_dict()))
            .collect()
    }
}

/// A single pipeline-env-variable <- dataset-attribute wiring.
#[derive(Debug, Clone)]
pub struct DatasetPort {
    pub dataset_attribute: String,
    pub env_variable: String,
}

/// The `dataset_pipeline_adapters` section: a named mapping from a logical port
/// to a dataset attribute and the env var a pipeline template reads it from.
#[derive(Debug, Clone, Default)]
pub struct DatasetPortsGroup {
    ports: Vec<DatasetPort>,
}

/// Minimal read access to a dataset's named attributes, so this crate does not
/// need to depend on the dataset crate's concrete type.
pub trait DatasetAttributeSource {
    fn name(&self) -> &str;
    fn attribute(&self, attribute: &str) -> Option<String>;
}

impl DatasetPortsGroup {
    pub fn new(ports: Vec<DatasetPort>) -> Self {
        Self { ports }
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Resolve env ports for `dataset`. Missing attributes are an error unless
    /// `missing_ok`, in which case they are silently dropped.
    pub fn get_env_ports(
        &self,
        dataset: &impl DatasetAttributeSource,
        missing_ok: bool,
    ) -> Result<HashMap<String, String>, ConfigError> {
        let mut env = HashMap::new();
        let mut missing = Vec::new();
        for port in &self.ports {
            match dataset.attribute(&port.dataset_attribute) {
                Some(v) => {
                    env.insert(port.env_variable.clone(), v);
                }
                None => missing.push(port.dataset_attribute.clone()),
            }
        }
        if !missing.is_empty() && !missing_ok {
            return Err(ConfigError::MissingPorts {
                dataset: dataset.name().to_string(),
                ports: missing,
            });
        }
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(name: &str, default: &str, type_tag: &str) -> ConfigOptionDict {
        ConfigOptionDict {
            name: name.to_string(),
            value: None,
            locked: false,
            default: default.to_string(),
            type_tag: type_tag.to_string(),
            env_variable: Some(format!("{}_ENV", name.to_uppercase())),
            description: None,
        }
    }

    #[test]
    fn output_group_rejects_disallowed_type() {
        let err = ConfigOptionGroup::outputs(vec![dict("p", "5", "int")]);
        assert!(matches!(err, Err(ConfigError::InvalidOptionType { .. })));
    }

    #[test]
    fn parameters_group_accepts_any_type() {
        let group = ConfigOptionGroup::parameters(vec![dict("p", "5", "int")]).unwrap();
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn get_env_ports_collects_wired_options() {
        let group =
            ConfigOptionGroup::parameters(vec![dict("thresh", "0.5", "float")]).unwrap();
        let env = group.get_env_ports();
        assert_eq!(env.get("THRESH_ENV").unwrap(), "0.5");
    }

    struct StubDataset {
        name: String,
        attrs: HashMap<String, String>,
    }

    impl DatasetAttributeSource for StubDataset {
        fn name(&self) -> &str {
            &self.name
        }
        fn attribute(&self, attribute: &str) -> Option<String> {
            self.attrs.get(attribute).cloned()
        }
    }

    #[test]
    fn missing_port_is_an_error_unless_missing_ok() {
        let group = DatasetPortsGroup::new(vec![DatasetPort {
            dataset_attribute: "color_image_list".to_string(),
            env_variable: "COLOR".to_string(),
        }]);
        let ds = StubDataset {
            name: "d1".to_string(),
            attrs: HashMap::new(),
        };
        assert!(group.get_env_ports(&ds, false).is_err());
        assert!(group.get_env_ports(&ds, true).unwrap().is_empty());
    }
}
