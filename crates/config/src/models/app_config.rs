use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    cluster::ClusterConfig,
    node_manager::{LifecycleConfig, NodeManagerConfig},
    observability::ObservabilityConfig,
    track_store::TrackStoreConfig,
};
use crate::validation::ConfigValidator;
use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node_manager: NodeManagerConfig,
    pub lifecycle: LifecycleConfig,
    pub track_store: TrackStoreConfig,
    pub observability: ObservabilityConfig,
    pub cluster: ClusterConfig,
}

impl AppConfig {
    /// 加载配置：TOML 文件 + `MEDIAFLOW_` 前缀的环境变量
    ///
    /// 环境变量以 `__` 分隔层级，例如 `MEDIAFLOW_LIFECYCLE__MAX_START_ATTEMPTS=5`。
    pub fn load(config_path: Option<&str>) -> ConfigResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(ConfigError::File(format!("配置文件不存在: {path}")));
            }
        } else {
            let default_paths = [
                "config/mediaflow.toml",
                "mediaflow.toml",
                "/etc/mediaflow/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("MEDIAFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Configuration(format!("序列化配置为TOML失败: {e}")))
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.node_manager.validate()?;
        self.lifecycle.validate()?;
        self.track_store.validate()?;
        self.observability.validate()?;
        self.cluster.validate()?;
        Ok(())
    }
}
