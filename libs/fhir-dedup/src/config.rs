//! Deduplication settings
//!
//! Built in code with [`DedupConfig::builder`] or read from YAML:
//!
//! ```yaml
//! excluded_output_types: [Device]
//! missing_author_display: No Known Author
//! alert_on_missing_patient: true
//! ```

use crate::error::ConfigError;
use ferrum_models::ResourceType;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MISSING_AUTHOR_DISPLAY: &str = "No Known Author";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Kinds used while deduplicating but left out of the output bundle
    pub excluded_output_types: Vec<ResourceType>,

    /// Display of the placeholder left when every composition author is dropped
    pub missing_author_display: String,

    /// Raise an alert when the graph holds no Patient
    pub alert_on_missing_patient: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            excluded_output_types: vec![ResourceType::Device],
            missing_author_display: DEFAULT_MISSING_AUTHOR_DISPLAY.to_string(),
            alert_on_missing_patient: true,
        }
    }
}

impl DedupConfig {
    pub fn builder() -> DedupConfigBuilder {
        DedupConfigBuilder::default()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.excluded_output_types.contains(&ResourceType::Patient) {
            return Err(ConfigError::PatientExcluded);
        }
        if self.missing_author_display.trim().is_empty() {
            return Err(ConfigError::EmptyAuthorDisplay);
        }
        for (i, resource_type) in self.excluded_output_types.iter().enumerate() {
            if self.excluded_output_types[..i].contains(resource_type) {
                return Err(ConfigError::InvalidConfig(format!(
                    "{resource_type} is listed twice in excluded_output_types"
                )));
            }
        }
        Ok(())
    }

    pub fn is_excluded(&self, resource_type: ResourceType) -> bool {
        self.excluded_output_types.contains(&resource_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupConfigBuilder {
    config: DedupConfig,
}

impl DedupConfigBuilder {
    pub fn excluded_output_types(mut self, types: impl IntoIterator<Item = ResourceType>) -> Self {
        self.config.excluded_output_types = types.into_iter().collect();
        self
    }

    pub fn exclude_output_type(mut self, resource_type: ResourceType) -> Self {
        if !self.config.excluded_output_types.contains(&resource_type) {
            self.config.excluded_output_types.push(resource_type);
        }
        self
    }

    pub fn missing_author_display(mut self, display: impl Into<String>) -> Self {
        self.config.missing_author_display = display.into();
        self
    }

    pub fn alert_on_missing_patient(mut self, alert: bool) -> Self {
        self.config.alert_on_missing_patient = alert;
        self
    }

    pub fn build(self) -> DedupConfig {
        self.config
    }
}
