//! 集群拓扑：节点及其承载的服务

use std::collections::HashSet;
use std::fmt;

use mediaflow_errors::{MediaflowError, MediaflowResult};
use serde::{Deserialize, Serialize};

/// 节点上可部署的工作单元，身份仅在所属节点内唯一
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub launcher: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            launcher: "simple".to_string(),
            args: Vec::new(),
        }
    }

    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub target: String,
    pub auto_configured: bool,
    pub services: Vec<Service>,
}

impl Node {
    pub fn new(target: impl Into<String>, auto_configured: bool, services: Vec<Service>) -> Self {
        Self {
            target: target.into(),
            auto_configured,
            services,
        }
    }

    pub fn service_ids(&self) -> impl Iterator<Item = ServiceId> + '_ {
        self.services
            .iter()
            .map(|service| ServiceId::new(self.target.clone(), service.name.clone()))
    }
}

/// 全局服务标识：`节点/服务`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId {
    pub node: String,
    pub service: String,
}

impl ServiceId {
    pub fn new(node: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.service)
    }
}

/// 已校验的集群拓扑，启动后只读
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTopology {
    nodes: Vec<Node>,
}

impl ClusterTopology {
    /// 拒绝重复的节点 target、空 target、以及同一节点内的重复服务名
    pub fn new(nodes: Vec<Node>) -> MediaflowResult<Self> {
        let mut targets = HashSet::new();
        for node in &nodes {
            if node.target.trim().is_empty() {
                return Err(MediaflowError::validation_error("节点 target 不能为空"));
            }
            if !targets.insert(node.target.as_str()) {
                return Err(MediaflowError::duplicate_node(node.target.clone()));
            }

            let mut names = HashSet::new();
            for service in &node.services {
                if service.name.trim().is_empty() {
                    return Err(MediaflowError::validation_error(format!(
                        "节点 {} 上存在空的服务名称",
                        node.target
                    )));
                }
                if !names.insert(service.name.as_str()) {
                    return Err(MediaflowError::validation_error(format!(
                        "节点 {} 上的服务 {} 重复声明",
                        node.target, service.name
                    )));
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, target: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.target == target)
    }

    /// 按声明顺序列出全部服务
    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.nodes.iter().flat_map(Node::service_ids).collect()
    }

    pub fn service_count(&self) -> usize {
        self.nodes.iter().map(|node| node.services.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.service_count() == 0
    }
}
