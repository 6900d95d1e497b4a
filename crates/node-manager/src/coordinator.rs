//! 集群生命周期协调器
//!
//! 为拓扑中的每个服务构建一个控制器，并行启停，并把各服务状态聚合为集群视图。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use mediaflow_config::LifecycleConfig;
use mediaflow_domain::{
    ClusterStatus, ClusterTopology, CommandChannel, ServiceId, ServiceState, ServiceTransition,
};
use mediaflow_errors::{MediaflowError, MediaflowResult};
use mediaflow_infrastructure::LifecycleMetrics;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::{LifecycleSettings, ServiceLifecycleController};

const TRANSITION_CHANNEL_CAPACITY: usize = 256;

type StopFuture = Shared<BoxFuture<'static, ()>>;

pub struct ClusterLifecycleCoordinator {
    channel: Arc<dyn CommandChannel>,
    settings: LifecycleSettings,
    service_timeout: Duration,
    topology: RwLock<ClusterTopology>,
    controllers: RwLock<Vec<ServiceLifecycleController>>,
    transitions: broadcast::Sender<ServiceTransition>,
    stop_in_flight: Mutex<Option<StopFuture>>,
    metrics: LifecycleMetrics,
}

impl ClusterLifecycleCoordinator {
    pub fn new(
        topology: ClusterTopology,
        channel: Arc<dyn CommandChannel>,
        settings: LifecycleSettings,
        service_timeout: Duration,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        let controllers = build_controllers(&topology, &channel, &settings, &transitions);
        info!(
            "Cluster coordinator created for {} nodes / {} services",
            topology.nodes().len(),
            controllers.len()
        );

        Self {
            channel,
            settings,
            service_timeout,
            topology: RwLock::new(topology),
            controllers: RwLock::new(controllers),
            transitions,
            stop_in_flight: Mutex::new(None),
            metrics: LifecycleMetrics::new(),
        }
    }

    pub fn from_config(
        topology: ClusterTopology,
        channel: Arc<dyn CommandChannel>,
        config: &LifecycleConfig,
    ) -> Self {
        Self::new(
            topology,
            channel,
            LifecycleSettings::from(config),
            Duration::from_secs(config.service_timeout_seconds),
        )
    }

    /// 并行启动全部服务，直到每个服务落到 RUNNING 或 FAILED
    ///
    /// 单个服务超过服务超时会被置为 FAILED，不会拖住整个集群。启动失败体现在返回的集群状态里，
    /// 而不是错误；只有在集群停止过程中调用才返回错误。
    pub async fn init(&self, resume: bool) -> MediaflowResult<ClusterStatus> {
        if self.stop_in_flight.lock().await.is_some() {
            return Err(MediaflowError::validation_error("集群正在停止，无法初始化"));
        }

        let started = Instant::now();
        let controllers = self.controllers.read().await.clone();
        info!(
            "Initializing {} services (resume: {})",
            controllers.len(),
            resume
        );

        let service_timeout = self.service_timeout;
        join_all(controllers.iter().map(|controller| async move {
            let operation = async {
                if resume {
                    controller.resume().await
                } else {
                    controller.start().await
                }
            };
            match tokio::time::timeout(service_timeout, operation).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Service {} did not start: {}", controller.id(), e),
                Err(_) => {
                    warn!(
                        "Service {} did not settle within {:?}",
                        controller.id(),
                        service_timeout
                    );
                    controller
                        .mark_failed(format!("启动未在 {service_timeout:?} 内完成"))
                        .await;
                }
            }
        }))
        .await;

        self.metrics.record_cluster_operation("init", started.elapsed());
        let status = self.status().await;
        info!(
            "Cluster init finished: {} running, {} failed, {} total",
            status.count_in(ServiceState::Running),
            status.count_in(ServiceState::Failed),
            status.services.len()
        );
        Ok(status)
    }

    /// 并行停止全部服务，直到全部 STOPPED
    ///
    /// 并发的第二次调用复用正在进行的停止过程，不会重复下发停止命令。
    pub async fn stop(&self) {
        let in_flight = {
            let mut slot = self.stop_in_flight.lock().await;
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("Joining in-flight cluster stop");
                    in_flight.clone()
                }
                None => {
                    let controllers = self.controllers.read().await.clone();
                    let stop = stop_all(controllers, self.service_timeout).boxed().shared();
                    *slot = Some(stop.clone());
                    stop
                }
            }
        };

        let started = Instant::now();
        in_flight.clone().await;

        let mut slot = self.stop_in_flight.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&in_flight)) {
            *slot = None;
            self.metrics.record_cluster_operation("stop", started.elapsed());
        }
    }

    /// 回调式停止：后台执行 [`stop`](Self::stop)，全部停止后调用 `on_complete`
    pub fn stop_with_callback<F>(self: &Arc<Self>, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.stop().await;
            on_complete();
        })
    }

    /// 至少一个服务处于 RUNNING
    pub async fn is_running(&self) -> bool {
        self.controllers
            .read()
            .await
            .iter()
            .any(|controller| controller.state() == ServiceState::Running)
    }

    pub async fn status(&self) -> ClusterStatus {
        let services = self
            .controllers
            .read()
            .await
            .iter()
            .map(ServiceLifecycleController::status)
            .collect();
        ClusterStatus::from_services(services)
    }

    pub async fn controller(&self, id: &ServiceId) -> Option<ServiceLifecycleController> {
        self.controllers
            .read()
            .await
            .iter()
            .find(|controller| controller.id() == id)
            .cloned()
    }

    pub async fn topology(&self) -> ClusterTopology {
        self.topology.read().await.clone()
    }

    /// 订阅所有服务的状态迁移
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceTransition> {
        self.transitions.subscribe()
    }

    /// 替换拓扑并重建控制器，任何服务处于活动期时拒绝
    pub async fn reconfigure(&self, topology: ClusterTopology) -> MediaflowResult<()> {
        let mut controllers = self.controllers.write().await;
        if let Some(active) = controllers.iter().find(|c| c.state().is_active()) {
            return Err(MediaflowError::validation_error(format!(
                "服务 {} 处于 {} 状态，无法重新配置拓扑",
                active.id(),
                active.state()
            )));
        }

        *controllers = build_controllers(&topology, &self.channel, &self.settings, &self.transitions);
        info!(
            "Cluster reconfigured: {} nodes / {} services",
            topology.nodes().len(),
            controllers.len()
        );
        *self.topology.write().await = topology;
        Ok(())
    }
}

fn build_controllers(
    topology: &ClusterTopology,
    channel: &Arc<dyn CommandChannel>,
    settings: &LifecycleSettings,
    transitions: &broadcast::Sender<ServiceTransition>,
) -> Vec<ServiceLifecycleController> {
    topology
        .nodes()
        .iter()
        .flat_map(|node| {
            node.services.iter().map(move |service| {
                ServiceLifecycleController::new(
                    ServiceId::new(node.target.clone(), service.name.clone()),
                    service.clone(),
                    Arc::clone(channel),
                    settings.clone(),
                    transitions.clone(),
                )
            })
        })
        .collect()
}

async fn stop_all(controllers: Vec<ServiceLifecycleController>, service_timeout: Duration) {
    info!("Stopping {} services", controllers.len());
    join_all(controllers.iter().map(|controller| async move {
        if tokio::time::timeout(service_timeout, controller.stop())
            .await
            .is_err()
        {
            warn!(
                "Service {} did not stop within {:?}",
                controller.id(),
                service_timeout
            );
            // 启动操作仍占着锁时不再无限等待
            let reason = format!("停止未在 {service_timeout:?} 内完成");
            if tokio::time::timeout(service_timeout, controller.mark_stop_failed(reason))
                .await
                .is_err()
            {
                warn!("Service {} is still busy, status left unchanged", controller.id());
            }
        }
    }))
    .await;
    info!("All services stopped");
}
