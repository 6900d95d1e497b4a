use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 节点管理器（集群协调器宿主）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeManagerConfig {
    /// 进程启动时是否自动拉起集群服务
    pub enabled: bool,
    /// 以恢复模式启动：已在运行的服务直接接管，不再下发启动命令
    pub resume: bool,
    pub channel: ChannelConfig,
}

impl Default for NodeManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resume: false,
            channel: ChannelConfig::default(),
        }
    }
}

impl ConfigValidator for NodeManagerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.channel.validate()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Http,
    InMemory,
}

/// 命令通道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    /// 各节点上节点代理的HTTP端口
    pub node_port: u16,
    pub request_timeout_seconds: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: ChannelKind::Http,
            node_port: 8008,
            request_timeout_seconds: 10,
        }
    }
}

impl ConfigValidator for ChannelConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_port(self.node_port, "node_manager.channel.node_port")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "node_manager.channel.request_timeout_seconds",
        )?;
        Ok(())
    }
}

/// 服务生命周期策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub max_start_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// 重试间隔的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
    /// 单次启动/停止命令往返的超时
    pub command_timeout_seconds: u64,
    /// init/stop 时每个服务的总超时，超时即判定为 FAILED
    pub service_timeout_seconds: u64,
    pub health_check_interval_seconds: u64,
    pub restart_on_health_failure: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_start_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            command_timeout_seconds: 30,
            service_timeout_seconds: 120,
            health_check_interval_seconds: 10,
            restart_on_health_failure: true,
        }
    }
}

impl ConfigValidator for LifecycleConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(
            self.max_start_attempts as u64,
            "lifecycle.max_start_attempts",
            100,
        )?;
        ValidationUtils::validate_count(
            self.initial_backoff_ms,
            "lifecycle.initial_backoff_ms",
            3_600_000,
        )?;
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(crate::ConfigError::Validation(
                "lifecycle.max_backoff_ms must be >= lifecycle.initial_backoff_ms".to_string(),
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(crate::ConfigError::Validation(
                "lifecycle.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(crate::ConfigError::Validation(
                "lifecycle.jitter_factor must be within [0.0, 1.0]".to_string(),
            ));
        }
        ValidationUtils::validate_timeout_seconds(
            self.command_timeout_seconds,
            "lifecycle.command_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.service_timeout_seconds,
            "lifecycle.service_timeout_seconds",
        )?;
        // 0 表示关闭周期性健康检查
        if self.health_check_interval_seconds != 0 {
            ValidationUtils::validate_timeout_seconds(
                self.health_check_interval_seconds,
                "lifecycle.health_check_interval_seconds",
            )?;
        }
        if self.service_timeout_seconds < self.command_timeout_seconds {
            return Err(crate::ConfigError::Validation(
                "lifecycle.service_timeout_seconds must be >= lifecycle.command_timeout_seconds"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_config_validation() {
        let config = LifecycleConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.max_start_attempts = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.max_backoff_ms = invalid.initial_backoff_ms - 1;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.backoff_multiplier = 0.5;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.jitter_factor = 1.5;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.service_timeout_seconds = 1;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_zero_health_interval_disables_monitoring() {
        let mut config = LifecycleConfig::default();
        config.health_check_interval_seconds = 0;
        assert!(config.validate().is_ok());

        config.health_check_interval_seconds = 3601;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_config_validation() {
        let config = ChannelConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.node_port = 0;
        assert!(invalid.validate().is_err());
    }
}
