use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_one_of(
            &self.log_level.to_lowercase(),
            "observability.log_level",
            &["trace", "debug", "info", "warn", "error"],
        )?;
        ValidationUtils::validate_one_of(
            &self.log_format,
            "observability.log_format",
            &["json", "pretty"],
        )?;
        if self.metrics_enabled {
            ValidationUtils::validate_port(self.metrics_port, "observability.metrics_port")?;
        }
        Ok(())
    }
}
