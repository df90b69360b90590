use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Backend adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    /// Adapter name, shown in error messages as `scimgateway[<name>]`.
    #[serde(default = "default_adapter_name")]
    pub name: String,

    /// Attributes the adapter accepts on create and modify. Dotted paths
    /// (`name.givenName`), whole multivalue attributes (`emails`) or type
    /// discriminators (`emails.[].type=work`). Empty accepts everything.
    #[serde(default)]
    pub attributes: Vec<String>,

    /// Groups to create at startup. Groups cannot be created over SCIM.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            name: default_adapter_name(),
            attributes: Vec::new(),
            groups: Vec::new(),
        }
    }
}

fn default_adapter_name() -> String {
    "memory".to_string()
}

impl AdapterConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("adapter.name must not be empty".into()));
        }
        if let Some(bad) = self.attributes.iter().find(|a| a.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "adapter.attributes contains an empty entry: {bad:?}"
            )));
        }
        if let Some(bad) = self
            .attributes
            .iter()
            .find(|a| a.contains(".[].") && !a.contains(".[].type="))
        {
            return Err(ConfigError::Validation(format!(
                "adapter.attributes entry {bad:?} must use the form <attr>.[].type=<value>"
            )));
        }
        if self.groups.iter().any(|g| g.trim().is_empty()) {
            return Err(ConfigError::Validation("adapter.groups contains an empty name".into()));
        }
        Ok(())
    }
}
