//! 单个服务的生命周期控制器
//!
//! 状态机：`STOPPED → STARTING → RUNNING → STOPPING → STOPPED`，启动重试耗尽或运行中健康检查失败进入 `FAILED`。
//! 启停操作由操作锁串行化；健康检查的远程探测不持有该锁，只在落地状态时尝试获取，
//! 因此周期性健康检查不会阻塞 `stop()`，也不会覆盖启停产生的迁移。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediaflow_config::LifecycleConfig;
use mediaflow_domain::{
    CommandChannel, HealthStatus, Service, ServiceId, ServiceState, ServiceStatus,
    ServiceTransition,
};
use mediaflow_errors::{MediaflowError, MediaflowResult};
use mediaflow_infrastructure::LifecycleMetrics;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::health;
use crate::retry::RetryPolicy;

/// 控制器运行参数
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub retry: RetryPolicy,
    /// 单次启停命令或健康探测的往返上限
    pub command_timeout: Duration,
    /// 为零时不启动周期性健康检查
    pub health_check_interval: Duration,
    pub restart_on_health_failure: bool,
}

impl From<&LifecycleConfig> for LifecycleSettings {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            retry: RetryPolicy::from(config),
            command_timeout: Duration::from_secs(config.command_timeout_seconds),
            health_check_interval: Duration::from_secs(config.health_check_interval_seconds),
            restart_on_health_failure: config.restart_on_health_failure,
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

/// 一次健康检查的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckOutcome {
    Healthy,
    /// 服务已被置为 FAILED
    Failed(HealthStatus),
    /// 服务不在运行，或启停操作正在进行
    Skipped,
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: ServiceState,
    last_error: Option<String>,
    /// 每次进入 RUNNING 递增，用于识别过期的健康检查结果
    running_epoch: u64,
}

pub(crate) struct ControllerInner {
    id: ServiceId,
    service: Service,
    channel: Arc<dyn CommandChannel>,
    settings: LifecycleSettings,
    snapshot: watch::Sender<Snapshot>,
    stop_signal: watch::Sender<bool>,
    op_lock: Mutex<()>,
    health_shutdown: Mutex<Option<broadcast::Sender<()>>>,
    transitions: broadcast::Sender<ServiceTransition>,
    metrics: LifecycleMetrics,
}

/// 服务状态只由自身控制器修改，其余组件通过 [`status`](Self::status) 读取
#[derive(Clone)]
pub struct ServiceLifecycleController {
    inner: Arc<ControllerInner>,
}

impl ServiceLifecycleController {
    pub fn new(
        id: ServiceId,
        service: Service,
        channel: Arc<dyn CommandChannel>,
        settings: LifecycleSettings,
        transitions: broadcast::Sender<ServiceTransition>,
    ) -> Self {
        let (snapshot, _) = watch::channel(Snapshot {
            state: ServiceState::Stopped,
            last_error: None,
            running_epoch: 0,
        });
        let (stop_signal, _) = watch::channel(false);

        Self {
            inner: Arc::new(ControllerInner {
                id,
                service,
                channel,
                settings,
                snapshot,
                stop_signal,
                op_lock: Mutex::new(()),
                health_shutdown: Mutex::new(None),
                transitions,
                metrics: LifecycleMetrics::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ControllerInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &ServiceId {
        &self.inner.id
    }

    pub fn service(&self) -> &Service {
        &self.inner.service
    }

    pub(crate) fn settings(&self) -> &LifecycleSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> ServiceState {
        self.inner.snapshot.borrow().state
    }

    pub fn status(&self) -> ServiceStatus {
        let snapshot = self.inner.snapshot.borrow();
        ServiceStatus {
            service: self.inner.id.clone(),
            state: snapshot.state,
            last_error: snapshot.last_error.clone(),
        }
    }

    /// 等待状态满足条件
    pub async fn wait_for_state<F>(&self, predicate: F) -> ServiceState
    where
        F: Fn(ServiceState) -> bool,
    {
        let mut rx = self.inner.snapshot.subscribe();
        let state = match rx.wait_for(|snapshot| predicate(snapshot.state)).await {
            Ok(snapshot) => snapshot.state,
            Err(_) => self.state(),
        };
        state
    }

    /// 启动服务；已在 STARTING/RUNNING 时直接返回
    ///
    /// 失败时按退避策略重试，耗尽后置为 FAILED 并返回 [`MediaflowError::ServiceStart`]。
    pub async fn start(&self) -> MediaflowResult<()> {
        if matches!(self.state(), ServiceState::Starting | ServiceState::Running) {
            debug!("{} is already {}, start ignored", self.inner.id, self.state());
            return Ok(());
        }
        let _guard = self.inner.op_lock.lock().await;
        self.start_locked().await
    }

    /// 先探测外部是否已有运行中的实例，健康则直接接管为 RUNNING，否则正常启动
    pub async fn resume(&self) -> MediaflowResult<()> {
        if matches!(self.state(), ServiceState::Starting | ServiceState::Running) {
            return Ok(());
        }
        let _guard = self.inner.op_lock.lock().await;
        if matches!(self.state(), ServiceState::Starting | ServiceState::Running) {
            return Ok(());
        }

        match self
            .command(self.inner.channel.check_health(&self.inner.id))
            .await
        {
            Ok(HealthStatus::Healthy) => {
                info!("Adopting running instance of {}", self.inner.id);
                self.transition(ServiceState::Starting, None);
                self.transition(
                    ServiceState::Running,
                    Some("接管已在运行的实例".to_string()),
                );
                self.spawn_health_monitor().await;
                return Ok(());
            }
            Ok(status) => debug!("{} reports {:?}, starting normally", self.inner.id, status),
            Err(e) => debug!("Probe of {} failed, starting normally: {}", self.inner.id, e),
        }
        self.start_locked().await
    }

    async fn start_locked(&self) -> MediaflowResult<()> {
        if matches!(self.state(), ServiceState::Starting | ServiceState::Running) {
            return Ok(());
        }

        self.inner.stop_signal.send_replace(false);
        self.run_start().await
    }

    /// 健康检查失败后的自动重启
    ///
    /// 只有服务仍停在同一运行周期的 FAILED 且没有停止请求时才重启。与 [`start`](Self::start)
    /// 不同，这里不清除停止信号，因此与之交错的 `stop()` 总是胜出。
    pub(crate) async fn restart_after_health_failure(&self, failed_epoch: u64) -> MediaflowResult<()> {
        let _guard = self.inner.op_lock.lock().await;
        let eligible = {
            let snapshot = self.inner.snapshot.borrow();
            snapshot.state == ServiceState::Failed && snapshot.running_epoch == failed_epoch
        };
        if !eligible || self.stop_requested() {
            debug!("{} changed since the health failure, restart skipped", self.inner.id);
            return Ok(());
        }
        self.run_start().await
    }

    async fn run_start(&self) -> MediaflowResult<()> {
        self.transition(ServiceState::Starting, None);
        let started = Instant::now();

        let result = self.start_with_retry().await;
        match &result {
            Ok(()) => {
                self.transition(ServiceState::Running, None);
                self.spawn_health_monitor().await;
            }
            Err(e) => {
                error!("Service {} failed to start: {}", self.inner.id, e);
                self.transition(ServiceState::Failed, Some(e.to_string()));
            }
        }
        self.inner.metrics.record_start(
            &self.inner.id.to_string(),
            result.is_ok(),
            started.elapsed(),
        );
        result
    }

    async fn start_with_retry(&self) -> MediaflowResult<()> {
        let policy = &self.inner.settings.retry;
        let id = &self.inner.id;
        let mut last_error = "未进行任何启动尝试".to_string();

        for attempt in 1..=policy.max_attempts {
            if self.stop_requested() {
                return Err(MediaflowError::service_start(
                    id.to_string(),
                    attempt - 1,
                    "启动被停止请求中断",
                ));
            }

            self.inner.metrics.record_start_attempt();
            match self.attempt_start().await {
                Ok(()) => {
                    if attempt > 1 {
                        info!("{} started after {} attempts", id, attempt);
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Start attempt {}/{} for {} failed: {}",
                        attempt, policy.max_attempts, id, e
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < policy.max_attempts {
                let delay = policy.jittered_backoff(attempt);
                debug!("Retrying start of {} in {:?}", id, delay);
                if !self.sleep_unless_stopped(delay).await {
                    return Err(MediaflowError::service_start(
                        id.to_string(),
                        attempt,
                        "启动被停止请求中断",
                    ));
                }
            }
        }

        Err(MediaflowError::service_start(
            id.to_string(),
            policy.max_attempts,
            last_error,
        ))
    }

    /// 发送启动命令并确认健康
    async fn attempt_start(&self) -> MediaflowResult<()> {
        self.command(
            self.inner
                .channel
                .start_service(&self.inner.id, &self.inner.service),
        )
        .await?;

        match self
            .command(self.inner.channel.check_health(&self.inner.id))
            .await?
        {
            HealthStatus::Healthy => Ok(()),
            status => Err(MediaflowError::channel_error(format!(
                "{} 启动后健康检查未通过: {:?}",
                self.inner.id, status
            ))),
        }
    }

    /// 停止服务，任何状态下都允许，包括 FAILED
    ///
    /// 正在进行的启动重试会被中断。停止命令失败只记录日志，服务仍落到 STOPPED。
    pub async fn stop(&self) {
        if self.state() == ServiceState::Stopped {
            return;
        }
        self.inner.stop_signal.send_replace(true);

        let _guard = self.inner.op_lock.lock().await;
        if self.state() == ServiceState::Stopped {
            debug!("{} already stopped", self.inner.id);
            return;
        }

        let started = Instant::now();
        self.shutdown_health_monitor().await;
        self.transition(ServiceState::Stopping, None);

        let reason = match self
            .command(self.inner.channel.stop_service(&self.inner.id))
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    "Stop command for {} failed, marking stopped anyway: {}",
                    self.inner.id, e
                );
                Some(format!("停止命令失败: {e}"))
            }
        };

        self.transition(ServiceState::Stopped, reason);
        self.inner
            .metrics
            .record_stop(&self.inner.id.to_string(), started.elapsed());
    }

    /// 探测一次健康状态；运行中探测失败则置为 FAILED
    pub async fn health_check(&self) -> HealthCheckOutcome {
        let epoch = {
            let snapshot = self.inner.snapshot.borrow();
            if snapshot.state != ServiceState::Running {
                return HealthCheckOutcome::Skipped;
            }
            snapshot.running_epoch
        };

        let status = match self
            .command(self.inner.channel.check_health(&self.inner.id))
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!("Health probe of {} failed: {}", self.inner.id, e);
                HealthStatus::Unhealthy
            }
        };
        if status.is_healthy() {
            return HealthCheckOutcome::Healthy;
        }

        let Ok(_guard) = self.inner.op_lock.try_lock() else {
            debug!("{} is busy with start/stop, skipping health verdict", self.inner.id);
            return HealthCheckOutcome::Skipped;
        };
        let current = {
            let snapshot = self.inner.snapshot.borrow();
            snapshot.state == ServiceState::Running && snapshot.running_epoch == epoch
        };
        if !current {
            return HealthCheckOutcome::Skipped;
        }

        self.inner.metrics.record_health_check_failure();
        self.transition(
            ServiceState::Failed,
            Some(format!("健康检查失败: {status:?}")),
        );
        HealthCheckOutcome::Failed(status)
    }

    /// 启动操作被外部超时放弃时调用
    pub(crate) async fn mark_failed(&self, reason: impl Into<String>) {
        self.fail_if_in(&[ServiceState::Starting], reason.into()).await;
    }

    /// 停止操作被外部超时放弃时调用；尚未落到 STOPPED 的服务一律报告为 FAILED
    pub(crate) async fn mark_stop_failed(&self, reason: impl Into<String>) {
        self.fail_if_in(
            &[
                ServiceState::Starting,
                ServiceState::Running,
                ServiceState::Stopping,
            ],
            reason.into(),
        )
        .await;
    }

    async fn fail_if_in(&self, unsettled: &[ServiceState], reason: String) {
        let _guard = self.inner.op_lock.lock().await;
        if unsettled.contains(&self.state()) {
            self.shutdown_health_monitor().await;
            self.transition(ServiceState::Failed, Some(reason));
        }
    }

    pub(crate) fn running_epoch(&self) -> u64 {
        self.inner.snapshot.borrow().running_epoch
    }

    pub(crate) fn stop_requested(&self) -> bool {
        *self.inner.stop_signal.borrow()
    }

    async fn command<T>(&self, fut: impl Future<Output = MediaflowResult<T>>) -> MediaflowResult<T> {
        let timeout = self.inner.settings.command_timeout;
        tokio::time::timeout(timeout, fut).await.map_err(|_| {
            MediaflowError::timeout_error(format!("{} 命令在 {:?} 内未完成", self.inner.id, timeout))
        })?
    }

    /// 返回 false 表示等待期间收到停止请求
    async fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        let mut stop_rx = self.inner.stop_signal.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(delay) => !self.stop_requested(),
            _ = stop_rx.wait_for(|requested| *requested) => false,
        }
    }

    async fn spawn_health_monitor(&self) {
        self.shutdown_health_monitor().await;
        let interval = self.inner.settings.health_check_interval;
        if interval.is_zero() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        *self.inner.health_shutdown.lock().await = Some(shutdown_tx);
        health::spawn_monitor(Arc::downgrade(&self.inner), interval, shutdown_rx);
    }

    async fn shutdown_health_monitor(&self) {
        if let Some(tx) = self.inner.health_shutdown.lock().await.take() {
            let _ = tx.send(());
        }
    }

    fn transition(&self, to: ServiceState, reason: Option<String>) {
        let mut from = to;
        self.inner.snapshot.send_modify(|snapshot| {
            from = snapshot.state;
            snapshot.state = to;
            match to {
                ServiceState::Running => {
                    snapshot.running_epoch += 1;
                    snapshot.last_error = None;
                }
                ServiceState::Failed | ServiceState::Stopped if reason.is_some() => {
                    snapshot.last_error = reason.clone();
                }
                _ => {}
            }
        });
        if from == to {
            return;
        }

        let metrics = &self.inner.metrics;
        metrics.record_transition(to.as_str());
        if to == ServiceState::Running {
            metrics.service_running();
        } else if from == ServiceState::Running {
            metrics.service_left_running();
        }

        info!(service = %self.inner.id, from = %from, to = %to, "Service state transition");
        // 没有订阅者时发送失败是正常情况
        let _ = self.inner.transitions.send(ServiceTransition::new(
            self.inner.id.clone(),
            from,
            to,
            reason,
        ));
    }
}
