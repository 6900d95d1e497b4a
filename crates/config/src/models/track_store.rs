use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackStoreKind {
    #[default]
    Redis,
    InMemory,
}

/// 轨迹仓储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackStoreConfig {
    pub kind: TrackStoreKind,
    pub redis_url: String,
    /// 所有轨迹键共享的前缀
    pub key_prefix: String,
    pub connection_timeout_seconds: u64,
}

impl Default for TrackStoreConfig {
    fn default() -> Self {
        Self {
            kind: TrackStoreKind::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "mediaflow".to_string(),
            connection_timeout_seconds: 5,
        }
    }
}

impl ConfigValidator for TrackStoreConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.key_prefix, "track_store.key_prefix")?;
        if self.key_prefix.contains(char::is_whitespace) {
            return Err(crate::ConfigError::Validation(
                "track_store.key_prefix cannot contain whitespace".to_string(),
            ));
        }
        ValidationUtils::validate_timeout_seconds(
            self.connection_timeout_seconds,
            "track_store.connection_timeout_seconds",
        )?;

        if self.kind == TrackStoreKind::Redis {
            ValidationUtils::validate_url(&self.redis_url, "track_store.redis_url")?;
            if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://")
            {
                return Err(crate::ConfigError::Validation(
                    "track_store.redis_url must start with redis:// or rediss://".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_store_config_validation() {
        let config = TrackStoreConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.redis_url = "http://localhost:6379".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.key_prefix = "media flow".to_string();
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_in_memory_store_ignores_redis_url() {
        let config = TrackStoreConfig {
            kind: TrackStoreKind::InMemory,
            redis_url: String::new(),
            ..TrackStoreConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
