use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a port number is valid
    pub fn validate_port(port: u16, field_name: &str) -> ConfigResult<()> {
        if port == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be 0"
            )));
        }
        Ok(())
    }

    /// Validate that a timeout is reasonable
    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> ConfigResult<()> {
        if timeout_seconds == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_seconds > 3600 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 3600"
            )));
        }
        Ok(())
    }

    /// Validate that a count lies in `1..=max`
    pub fn validate_count(count: u64, field_name: &str, max: u64) -> ConfigResult<()> {
        if count == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    /// Validate that a URL has a valid format
    pub fn validate_url(url: &str, field_name: &str) -> ConfigResult<()> {
        if url.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }

        if !url.contains("://") {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }

        Ok(())
    }

    /// Validate that a value is one of the accepted options
    pub fn validate_one_of(value: &str, field_name: &str, options: &[&str]) -> ConfigResult<()> {
        if !options.contains(&value) {
            return Err(crate::ConfigError::Validation(format!(
                "Invalid {field_name}: {value}. Valid options: {options:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(ValidationUtils::validate_not_empty("test", "field").is_ok());
        assert!(ValidationUtils::validate_not_empty("  test  ", "field").is_ok());
        assert!(ValidationUtils::validate_not_empty("", "field").is_err());
        assert!(ValidationUtils::validate_not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_validate_port() {
        assert!(ValidationUtils::validate_port(8008, "port").is_ok());
        assert!(ValidationUtils::validate_port(65535, "port").is_ok());
        assert!(ValidationUtils::validate_port(0, "port").is_err());
    }

    #[test]
    fn test_validate_timeout_seconds() {
        assert!(ValidationUtils::validate_timeout_seconds(30, "t").is_ok());
        assert!(ValidationUtils::validate_timeout_seconds(3600, "t").is_ok());
        assert!(ValidationUtils::validate_timeout_seconds(0, "t").is_err());
        assert!(ValidationUtils::validate_timeout_seconds(3601, "t").is_err());
    }

    #[test]
    fn test_validate_count() {
        assert!(ValidationUtils::validate_count(1, "test", 10).is_ok());
        assert!(ValidationUtils::validate_count(10, "test", 10).is_ok());
        assert!(ValidationUtils::validate_count(0, "test", 10).is_err());
        assert!(ValidationUtils::validate_count(11, "test", 10).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(ValidationUtils::validate_url("redis://localhost:6379", "url").is_ok());
        assert!(ValidationUtils::validate_url("", "url").is_err());
        assert!(ValidationUtils::validate_url("localhost:6379", "url").is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(ValidationUtils::validate_one_of("json", "format", &["json", "pretty"]).is_ok());
        assert!(ValidationUtils::validate_one_of("xml", "format", &["json", "pretty"]).is_err());
    }
}
