//! A single config option: a typed, possibly-locked value with a default.

use crate::error::ConfigError;
use crate::types::{parse_type, ConfigType};
use serde::{Deserialize, Serialize};

/// On-disk representation of a [`ConfigOption`], matching the manifest/snapshot
/// schema: `{name, _value, _locked, default, type, env_variable, description}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOptionDict {
    pub name: String,
    #[serde(rename = "_value", default)]
    pub value: Option<String>,
    #[serde(rename = "_locked", default)]
    pub locked: bool,
    pub default: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub env_variable: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A typed pipeline parameter or output option.
#[derive(Debug, Clone)]
pub struct ConfigOption {
    pub name: String,
    pub default: String,
    pub type_tag: ConfigType,
    pub env_variable: Option<String>,
    pub description: Option<String>,
    current: Option<String>,
    locked: bool,
}

impl ConfigOption {
    /// Construct a fresh option, validating `default` against `type_tag`.
    pub fn new(
        name: impl Into<String>,
        default: impl Into<String>,
        type_str: &str,
        env_variable: Option<String>,
        description: Option<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let default = default.into();
        let type_tag = parse_type(type_str);
        if type_tag.validate(&default).is_none() {
            return Err(ConfigError::InvalidDefault {
                name,
                type_tag: type_tag.tag(),
                default,
            });
        }
        Ok(Self {
            name,
            default,
            type_tag,
            env_variable,
            description,
            current: None,
            locked: false,
        })
    }

    /// Reconstruct from a persisted snapshot. Unlike [`Self::set_value`], a
    /// present `_value` bypasses the lock check so a locked snapshot survives
    /// round-tripping through disk.
    pub fn from_dict(dict: ConfigOptionDict) -> Result<Self, ConfigError> {
        let type_tag = parse_type(&dict.type_tag);
        if type_tag.validate(&dict.default).is_none() {
            return Err(ConfigError::InvalidDefault {
                name: dict.name,
                type_tag: type_tag.tag(),
                default: dict.default,
            });
        }
        Ok(Self {
            name: dict.name,
            default: dict.default,
            type_tag,
            env_variable: dict.env_variable,
            description: dict.description,
            current: dict.value,
            locked: dict.locked,
        })
    }

    pub fn to_dict(&self) -> ConfigOptionDict {
        ConfigOptionDict {
            name: self.name.clone(),
            value: self.current.clone(),
            locked: self.locked,
            default: self.default.clone(),
            type_tag: self.type_tag.tag(),
            env_variable: self.env_variable.clone(),
            description: self.description.clone(),
        }
    }

    /// Attempt to set the current value. Returns `false` without effect if the
    /// option is locked or `v` fails validation.
    pub fn set_value(&mut self, v: &str) -> bool {
        if self.locked {
            return false;
        }
        match self.type_tag.validate(v) {
            Some(normalised) => {
                self.current = Some(normalised);
                true
            }
            None => false,
        }
    }

    /// Clear the current value back to the default. No-op when locked.
    pub fn reset(&mut self) {
        if self.locked {
            return;
        }
        self.current = None;
    }

    /// Freeze the option at its current value (or default, if unset).
    pub fn lock(&mut self) {
        if self.current.is_none() {
            self.current = Some(self.default.clone());
        }
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn value(&self) -> &str {
        self.current.as_deref().unwrap_or(&self.default)
    }

    /// `(env_variable, value)`, when this option is wired to an env var.
    pub fn get_env(&self) -> Option<(String, String)> {
        self.env_variable
            .as_ref()
            .map(|k| (k.clone(), self.value().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_rejects_invalid_and_keeps_prior() {
        let mut opt = ConfigOption::new("n", "5", "int[0,10]", None, None).unwrap();
        assert!(opt.set_value("7"));
        assert_eq!(opt.value(), "7");
        assert!(!opt.set_value("99"));
        assert_eq!(opt.value(), "7");
    }

    #[test]
    fn locked_option_rejects_set_and_reset() {
        let mut opt = ConfigOption::new("n", "5", "int", None, None).unwrap();
        opt.set_value("9");
        opt.lock();
        assert!(!opt.set_value("1"));
        opt.reset();
        assert_eq!(opt.value(), "9");
    }

    #[test]
    fn to_dict_from_dict_roundtrip_preserves_lock() {
        let mut opt = ConfigOption::new("n", "foo.txt", "output_image_list", None, None).unwrap();
        opt.set_value("bar.txt");
        opt.lock();
        let dict = opt.to_dict();
        let restored = ConfigOption::from_dict(dict).unwrap();
        assert_eq!(restored.value(), "bar");
        assert!(restored.is_locked());
        assert!(!restored.clone_and_try_set("baz"));
    }

    impl ConfigOption {
        fn clone_and_try_set(&self, v: &str) -> bool {
            let mut c = self.clone();
            c.set_value(v)
        }
    }

    #[test]
    fn invalid_default_is_rejected_at_construction() {
        let err = ConfigOption::new("n", "not-a-number", "int", None, None);
        assert!(err.is_err());
    }
}
