//! Error types for the configuration model.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("default value {default:?} is not valid for type {type_tag} (option {name})")]
    InvalidDefault {
        name: String,
        type_tag: String,
        default: String,
    },

    #[error("option {name} has type {type_tag}, which is not permitted in group {group}")]
    InvalidOptionType {
        group: String,
        name: String,
        type_tag: String,
    },

    #[error("config group '{group}' is missing from the pipeline manifest entry '{pipeline}'")]
    MissingGroup { pipeline: String, group: String },

    #[error("dataset '{dataset}' is missing required port(s): {}", ports.join(", "))]
    MissingPorts { dataset: String, ports: Vec<String> },

    #[error("pipeline template not found: {0}")]
    TemplateNotFound(camino::Utf8PathBuf),

    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    Yaml {
        path: camino::Utf8PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown pipeline '{0}' in manifest")]
    UnknownPipeline(String),
}
