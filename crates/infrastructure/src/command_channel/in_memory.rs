use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use mediaflow_domain::{CommandChannel, HealthStatus, Service, ServiceId};
use mediaflow_errors::{MediaflowError, MediaflowResult};
use tokio::sync::RwLock;
use tracing::debug;

/// 内存命令通道
///
/// 模拟各节点上的服务进程，适用于嵌入式运行与测试。支持故障注入：
/// 前 N 次启动失败、健康检查不健康、停止失败、命令延迟。
#[derive(Debug, Default)]
pub struct InMemoryCommandChannel {
    services: RwLock<HashMap<ServiceId, SimulatedService>>,
    command_delay: RwLock<Duration>,
}

#[derive(Debug, Default, Clone)]
struct SimulatedService {
    running: bool,
    failing_starts: u32,
    unhealthy: bool,
    failing_stops: bool,
    start_calls: u32,
    stop_calls: u32,
    health_calls: u32,
}

/// 每个服务的命令调用次数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub start: u32,
    pub stop: u32,
    pub health: u32,
}

impl InMemoryCommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接下来 `count` 次启动命令失败
    pub async fn fail_starts(&self, id: &ServiceId, count: u32) {
        self.services.write().await.entry(id.clone()).or_default().failing_starts = count;
    }

    /// 启动命令永远失败
    pub async fn fail_all_starts(&self, id: &ServiceId) {
        self.fail_starts(id, u32::MAX).await;
    }

    pub async fn fail_stops(&self, id: &ServiceId, failing: bool) {
        self.services.write().await.entry(id.clone()).or_default().failing_stops = failing;
    }

    pub async fn set_unhealthy(&self, id: &ServiceId, unhealthy: bool) {
        self.services.write().await.entry(id.clone()).or_default().unhealthy = unhealthy;
    }

    /// 模拟进程外已经在运行的实例
    pub async fn mark_running(&self, id: &ServiceId) {
        self.services.write().await.entry(id.clone()).or_default().running = true;
    }

    /// 每个命令在处理前等待的时间
    pub async fn set_command_delay(&self, delay: Duration) {
        *self.command_delay.write().await = delay;
    }

    pub async fn is_running(&self, id: &ServiceId) -> bool {
        self.services
            .read()
            .await
            .get(id)
            .map(|service| service.running)
            .unwrap_or(false)
    }

    pub async fn calls(&self, id: &ServiceId) -> CallCounts {
        self.services
            .read()
            .await
            .get(id)
            .map(|service| CallCounts {
                start: service.start_calls,
                stop: service.stop_calls,
                health: service.health_calls,
            })
            .unwrap_or_default()
    }

    async fn delay(&self) {
        let delay = *self.command_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CommandChannel for InMemoryCommandChannel {
    async fn start_service(&self, id: &ServiceId, _service: &Service) -> MediaflowResult<()> {
        self.delay().await;
        let mut services = self.services.write().await;
        let service = services.entry(id.clone()).or_default();
        service.start_calls += 1;

        if service.failing_starts > 0 {
            if service.failing_starts != u32::MAX {
                service.failing_starts -= 1;
            }
            debug!("Simulated start failure for {}", id);
            return Err(MediaflowError::channel_error(format!("{id} 模拟启动失败")));
        }
        service.running = true;
        Ok(())
    }

    async fn stop_service(&self, id: &ServiceId) -> MediaflowResult<()> {
        self.delay().await;
        let mut services = self.services.write().await;
        let service = services.entry(id.clone()).or_default();
        service.stop_calls += 1;

        if service.failing_stops {
            return Err(MediaflowError::channel_error(format!("{id} 模拟停止失败")));
        }
        service.running = false;
        Ok(())
    }

    async fn check_health(&self, id: &ServiceId) -> MediaflowResult<HealthStatus> {
        let mut services = self.services.write().await;
        let service = services.entry(id.clone()).or_default();
        service.health_calls += 1;

        Ok(match (service.running, service.unhealthy) {
            (false, _) => HealthStatus::NotRunning,
            (true, true) => HealthStatus::Unhealthy,
            (true, false) => HealthStatus::Healthy,
        })
    }
}
