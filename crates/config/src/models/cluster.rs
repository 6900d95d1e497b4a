use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 集群拓扑声明：节点及其承载的服务
///
/// 节点名唯一性等跨条目约束在构建领域拓扑时校验，这里只做字段级检查。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub target: String,
    #[serde(default)]
    pub auto_configured: bool,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default = "default_launcher")]
    pub launcher: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_launcher() -> String {
    "simple".to_string()
}

impl ConfigValidator for ClusterConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        for node in &self.nodes {
            ValidationUtils::validate_not_empty(&node.target, "cluster.nodes.target")?;
            for service in &node.services {
                ValidationUtils::validate_not_empty(&service.name, "cluster.nodes.services.name")?;
                ValidationUtils::validate_not_empty(
                    &service.launcher,
                    "cluster.nodes.services.launcher",
                )?;
            }
        }
        Ok(())
    }
}
