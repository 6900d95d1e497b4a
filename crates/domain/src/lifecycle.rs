//! 服务生命周期状态与集群聚合视图

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::topology::ServiceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl ServiceState {
    /// 本次启动操作的终态
    pub fn is_start_settled(&self) -> bool {
        matches!(self, ServiceState::Running | ServiceState::Failed)
    }

    /// 服务处于活动期，拓扑不可修改
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ServiceState::Starting | ServiceState::Running | ServiceState::Stopping
        )
    }
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Stopped => "STOPPED",
            ServiceState::Starting => "STARTING",
            ServiceState::Running => "RUNNING",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 命令通道报告的健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    NotRunning,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// 一次可观察的状态迁移
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTransition {
    pub service: ServiceId,
    pub from: ServiceState,
    pub to: ServiceState,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ServiceTransition {
    pub fn new(
        service: ServiceId,
        from: ServiceState,
        to: ServiceState,
        reason: Option<String>,
    ) -> Self {
        Self {
            service,
            from,
            to,
            reason,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: ServiceId,
    pub state: ServiceState,
    pub last_error: Option<String>,
}

/// 由各服务状态实时推导的集群视图，不单独存储
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub running: bool,
    pub services: Vec<ServiceStatus>,
}

impl ClusterStatus {
    pub fn from_services(services: Vec<ServiceStatus>) -> Self {
        let running = services.iter().any(|s| s.state == ServiceState::Running);
        Self { running, services }
    }

    pub fn state_of(&self, service: &ServiceId) -> Option<ServiceState> {
        self.services
            .iter()
            .find(|s| &s.service == service)
            .map(|s| s.state)
    }

    pub fn count_in(&self, state: ServiceState) -> usize {
        self.services.iter().filter(|s| s.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_status(service: &str, state: ServiceState) -> ServiceStatus {
        ServiceStatus {
            service: ServiceId::new("node", service),
            state,
            last_error: None,
        }
    }

    #[test]
    fn test_state_display_and_serde() {
        assert_eq!(ServiceState::Stopping.to_string(), "STOPPING");
        assert_eq!(
            serde_json::to_string(&ServiceState::Failed).unwrap(),
            "\"FAILED\""
        );
        let health: HealthStatus = serde_json::from_str("\"NOT_RUNNING\"").unwrap();
        assert_eq!(health, HealthStatus::NotRunning);
    }

    #[test]
    fn test_cluster_running_means_any_service_running() {
        let cluster = ClusterStatus::from_services(vec![
            service_status("a", ServiceState::Failed),
            service_status("b", ServiceState::Running),
        ]);
        assert!(cluster.running);
        assert_eq!(cluster.count_in(ServiceState::Failed), 1);
        assert_eq!(
            cluster.state_of(&ServiceId::new("node", "b")),
            Some(ServiceState::Running)
        );

        let all_failed = ClusterStatus::from_services(vec![
            service_status("a", ServiceState::Failed),
            service_status("b", ServiceState::Starting),
        ]);
        assert!(!all_failed.running);
        assert!(!ClusterStatus::from_services(Vec::new()).running);
    }

    #[test]
    fn test_state_predicates() {
        assert!(ServiceState::Running.is_start_settled());
        assert!(ServiceState::Failed.is_start_settled());
        assert!(!ServiceState::Starting.is_start_settled());
        assert!(ServiceState::Stopping.is_active());
        assert!(!ServiceState::Failed.is_active());
    }
}
