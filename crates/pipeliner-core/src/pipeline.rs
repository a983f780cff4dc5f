//! A single named pipeline: its template path plus the three option groups that
//! parameterise it.

use crate::error::ConfigError;
use crate::group::{ConfigOptionGroup, DatasetAttributeSource, DatasetPortsGroup};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub name: String,
    pub template_path: Utf8PathBuf,
    pub directory: Utf8PathBuf,
    pub parameters: ConfigOptionGroup,
    pub outputs: ConfigOptionGroup,
    pub dataset_ports: DatasetPortsGroup,
}

impl PipelineConfig {
    pub fn new(
        name: impl Into<String>,
        template_path: Utf8PathBuf,
        parameters: ConfigOptionGroup,
        outputs: ConfigOptionGroup,
        dataset_ports: DatasetPortsGroup,
    ) -> Result<Self, ConfigError> {
        if !template_path.exists() {
            return Err(ConfigError::TemplateNotFound(template_path));
        }
        let directory = template_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        Ok(Self {
            name: name.into(),
            template_path,
            directory,
            parameters,
            outputs,
            dataset_ports,
        })
    }

    pub fn get_parameter_env_ports(&self) -> HashMap<String, String> {
        self.parameters.get_env_ports()
    }

    /// Output env ports rooted at `output_directory`: each output's value
    /// joined onto the base directory (timestamp/dataset macros are expanded
    /// separately by the compiler).
    pub fn get_output_env_ports(&self, output_directory: &Utf8Path) -> HashMap<String, String> {
        self.outputs
            .get_env_ports()
            .into_iter()
            .map(|(k, v)| (k, output_directory.join(v).to_string()))
            .collect()
    }

    pub fn get_pipeline_dataset_environment(
        &self,
        dataset: &impl DatasetAttributeSource,
        missing_ok: bool,
    ) -> Result<HashMap<String, String>, ConfigError> {
        self.dataset_ports.get_env_ports(dataset, missing_ok)
    }
}
