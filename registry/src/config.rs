//! Registry configuration.
//!
//! Fixed at startup; nothing here can change while the registry is running.

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::NUMBERED_SLOT_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Number of numbered slots handed out by `create_namespace`.
    /// Must be in `1..=10`; the default slot is not counted.
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,

    /// Metadata of the always-present default namespace.
    #[serde(default)]
    pub default_namespace: DefaultNamespaceConfig,

    /// Whether unfiltered listings include capabilities owned by the default
    /// namespace. A listing filtered to `default` always includes them.
    #[serde(default = "default_true")]
    pub include_default_in_unfiltered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DefaultNamespaceConfig {
    #[serde(default = "default_display_name")]
    pub display_name: String,

    #[serde(default = "default_description")]
    pub description: String,
}

fn default_max_slots() -> usize {
    NUMBERED_SLOT_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_display_name() -> String {
    "Default".to_string()
}

fn default_description() -> String {
    "General-purpose namespace available to every agent".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_slots: default_max_slots(),
            default_namespace: DefaultNamespaceConfig::default(),
            include_default_in_unfiltered: true,
        }
    }
}

impl Default for DefaultNamespaceConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            description: default_description(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a YAML file and validate it.
    pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_string(),
                source,
            })?;
        let config = Self::from_yaml(&content)?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_slots == 0 || self.max_slots > NUMBERED_SLOT_LIMIT {
            return Err(ConfigError::Invalid {
                field: "max_slots",
                message: format!(
                    "must be between 1 and {NUMBERED_SLOT_LIMIT}, got {}",
                    self.max_slots
                ),
            });
        }
        if self.default_namespace.display_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_namespace.display_name",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
