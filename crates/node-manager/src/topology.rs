use mediaflow_config::ClusterConfig;
use mediaflow_domain::{ClusterTopology, Node, Service};
use mediaflow_errors::MediaflowResult;

/// 由配置构建拓扑，重复节点在集群启动前被拒绝
pub fn load_topology(config: &ClusterConfig) -> MediaflowResult<ClusterTopology> {
    let nodes = config
        .nodes
        .iter()
        .map(|node| {
            Node::new(
                node.target.clone(),
                node.auto_configured,
                node.services
                    .iter()
                    .map(|service| {
                        Service::new(service.name.clone())
                            .with_launcher(service.launcher.clone())
                            .with_args(service.args.clone())
                    })
                    .collect(),
            )
        })
        .collect();
    ClusterTopology::new(nodes)
}
