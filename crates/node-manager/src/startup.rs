use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mediaflow_config::NodeManagerConfig;
use mediaflow_domain::ClusterStatus;
use mediaflow_errors::MediaflowResult;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::ClusterLifecycleCoordinator;

/// 宿主进程生命周期适配器
///
/// 进程启动时调用 [`start`](Self::start)，关闭时调用 [`stop`](Self::stop) 或
/// [`stop_with`](Self::stop_with)。重复的关闭信号不会再次执行拆除流程，只等待第一次拆除结束。
pub struct NodeManagerStartup {
    coordinator: Arc<ClusterLifecycleCoordinator>,
    enabled: bool,
    resume: bool,
    shutdown_triggered: AtomicBool,
    teardown_done: Arc<watch::Sender<bool>>,
}

impl NodeManagerStartup {
    pub fn new(coordinator: Arc<ClusterLifecycleCoordinator>, config: &NodeManagerConfig) -> Self {
        let (teardown_done, _) = watch::channel(false);
        Self {
            coordinator,
            enabled: config.enabled,
            resume: config.resume,
            shutdown_triggered: AtomicBool::new(false),
            teardown_done: Arc::new(teardown_done),
        }
    }

    pub fn coordinator(&self) -> &Arc<ClusterLifecycleCoordinator> {
        &self.coordinator
    }

    /// 节点管理关闭时返回 `None`
    pub async fn start(&self) -> MediaflowResult<Option<ClusterStatus>> {
        if !self.enabled {
            info!("Node manager disabled, skipping cluster init");
            return Ok(None);
        }
        self.teardown_done.send_replace(false);
        self.shutdown_triggered.store(false, Ordering::SeqCst);
        let status = self.coordinator.init(self.resume).await?;
        Ok(Some(status))
    }

    pub async fn stop(&self) {
        if self.shutdown_triggered.swap(true, Ordering::SeqCst) {
            debug!("Duplicate shutdown signal ignored");
            wait_teardown(self.teardown_done.subscribe()).await;
            return;
        }
        info!("Shutting down node manager");
        self.coordinator.stop().await;
        self.teardown_done.send_replace(true);
    }

    /// 回调总会被调用一次，重复信号也不例外
    pub fn stop_with<F>(&self, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let done_rx = self.teardown_done.subscribe();
        if self.shutdown_triggered.swap(true, Ordering::SeqCst) {
            debug!("Duplicate shutdown signal ignored");
            return tokio::spawn(async move {
                wait_teardown(done_rx).await;
                on_complete();
            });
        }

        info!("Shutting down node manager");
        let coordinator = Arc::clone(&self.coordinator);
        let teardown_done = Arc::clone(&self.teardown_done);
        tokio::spawn(async move {
            coordinator.stop().await;
            teardown_done.send_replace(true);
            on_complete();
        })
    }

    pub async fn is_running(&self) -> bool {
        self.coordinator.is_running().await
    }
}

async fn wait_teardown(mut done_rx: watch::Receiver<bool>) {
    // 发送端与适配器同生命周期，关闭只会发生在适配器被释放时
    let _ = done_rx.wait_for(|done| *done).await;
}
