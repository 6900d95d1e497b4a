use std::sync::Arc;

use anyhow::{Context, Result};
use mediaflow_config::AppConfig;
use mediaflow_domain::{ClusterStatus, ServiceState, TrackRepository};
use mediaflow_infrastructure::{CommandChannelFactory, TrackStoreFactory};
use mediaflow_node_manager::{load_topology, ClusterLifecycleCoordinator, NodeManagerStartup};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 主应用程序：轨迹仓储 + 集群生命周期管理
pub struct Application {
    config: AppConfig,
    track_store: Arc<dyn TrackRepository>,
    startup: Arc<NodeManagerStartup>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let track_store = TrackStoreFactory::create(&config.track_store)
            .await
            .context("创建轨迹仓储失败")?;

        let channel = CommandChannelFactory::create(&config.node_manager.channel)
            .context("创建命令通道失败")?;

        let topology = load_topology(&config.cluster).context("加载集群拓扑失败")?;
        info!(
            "Cluster topology loaded: {} nodes, {} services",
            topology.nodes().len(),
            topology.service_count()
        );

        let coordinator = Arc::new(ClusterLifecycleCoordinator::from_config(
            topology,
            channel,
            &config.lifecycle,
        ));
        let startup = Arc::new(NodeManagerStartup::new(coordinator, &config.node_manager));

        Ok(Self {
            config,
            track_store,
            startup,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn track_store(&self) -> Arc<dyn TrackRepository> {
        Arc::clone(&self.track_store)
    }

    pub fn startup(&self) -> Arc<NodeManagerStartup> {
        Arc::clone(&self.startup)
    }

    /// 启动集群并阻塞到收到关闭信号，然后拆除全部服务
    ///
    /// 初始化期间收到关闭信号时放弃尚未完成的启动，立即进入拆除流程。
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let interrupted = tokio::select! {
            started = self.startup.start() => {
                match started.context("集群初始化失败")? {
                    Some(status) => log_cluster_status(&status),
                    None => info!("节点管理未启用，仅提供轨迹仓储"),
                }
                false
            }
            signal = shutdown_rx.recv() => {
                if let Err(e) = signal {
                    warn!("关闭信号通道异常: {e}");
                }
                warn!("集群初始化期间收到关闭信号，中止启动");
                true
            }
        };

        if !interrupted {
            if let Err(e) = shutdown_rx.recv().await {
                warn!("关闭信号通道异常: {e}");
            }
        }

        info!("Stopping cluster services");
        self.startup.stop().await;
        info!("应用已停止");
        Ok(())
    }
}

fn log_cluster_status(status: &ClusterStatus) {
    let running = status.count_in(ServiceState::Running);
    let failed = status.count_in(ServiceState::Failed);
    info!(
        "Cluster init finished: {} running, {} failed, {} total",
        running,
        failed,
        status.services.len()
    );
    for service in status
        .services
        .iter()
        .filter(|s| s.state == ServiceState::Failed)
    {
        error!(
            "服务 {} 启动失败: {}",
            service.service,
            service.last_error.as_deref().unwrap_or("unknown")
        );
    }
}
