//! 显式埋点
//!
//! 生命周期操作与轨迹仓储操作各自包裹计时与计数调用，导出器在进程入口安装。

use std::time::Duration;

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use tracing::debug;

/// 生命周期控制指标
#[derive(Clone)]
pub struct LifecycleMetrics {
    start_attempts_total: Counter,
    start_failures_total: Counter,
    start_duration: Histogram,
    stop_duration: Histogram,
    health_check_failures_total: Counter,
    running_services: Gauge,
}

impl Default for LifecycleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self {
            start_attempts_total: counter!("mediaflow_service_start_attempts_total"),
            start_failures_total: counter!("mediaflow_service_start_failures_total"),
            start_duration: histogram!("mediaflow_service_start_duration_seconds"),
            stop_duration: histogram!("mediaflow_service_stop_duration_seconds"),
            health_check_failures_total: counter!("mediaflow_health_check_failures_total"),
            running_services: gauge!("mediaflow_running_services"),
        }
    }

    pub fn record_start_attempt(&self) {
        self.start_attempts_total.increment(1);
    }

    /// 一次完整的 start() 调用结束（含重试）
    pub fn record_start(&self, service: &str, succeeded: bool, duration: Duration) {
        self.start_duration.record(duration.as_secs_f64());
        if !succeeded {
            self.start_failures_total.increment(1);
        }
        debug!(
            service = service,
            succeeded = succeeded,
            duration_seconds = duration.as_secs_f64(),
            "Service start finished"
        );
    }

    pub fn record_stop(&self, service: &str, duration: Duration) {
        self.stop_duration.record(duration.as_secs_f64());
        debug!(
            service = service,
            duration_seconds = duration.as_secs_f64(),
            "Service stop finished"
        );
    }

    /// 集群级操作（init/stop）耗时
    pub fn record_cluster_operation(&self, operation: &'static str, duration: Duration) {
        histogram!("mediaflow_cluster_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    pub fn record_health_check_failure(&self) {
        self.health_check_failures_total.increment(1);
    }

    /// 状态迁移计数，按目标状态打标签
    pub fn record_transition(&self, to: &'static str) {
        counter!("mediaflow_service_transitions_total", "to" => to).increment(1);
    }

    pub fn service_running(&self) {
        self.running_services.increment(1.0);
    }

    pub fn service_left_running(&self) {
        self.running_services.decrement(1.0);
    }
}

/// 轨迹仓储指标
#[derive(Clone)]
pub struct TrackStoreMetrics {
    tracks_written_total: Counter,
}

impl Default for TrackStoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackStoreMetrics {
    pub fn new() -> Self {
        Self {
            tracks_written_total: counter!("mediaflow_tracks_written_total"),
        }
    }

    pub fn record_operation(&self, operation: &'static str, succeeded: bool, duration: Duration) {
        let outcome = if succeeded { "ok" } else { "error" };
        counter!("mediaflow_track_store_operations_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        histogram!("mediaflow_track_store_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    pub fn record_tracks_written(&self, count: usize) {
        self.tracks_written_total.increment(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 未安装 recorder 时所有调用都是空操作
    #[test]
    fn test_metrics_without_recorder() {
        let lifecycle = LifecycleMetrics::new();
        lifecycle.record_start_attempt();
        lifecycle.record_start("node/svc", false, Duration::from_millis(5));
        lifecycle.record_stop("node/svc", Duration::from_millis(1));
        lifecycle.record_transition("RUNNING");
        lifecycle.record_cluster_operation("init", Duration::from_millis(20));
        lifecycle.service_running();
        lifecycle.service_left_running();

        let store = TrackStoreMetrics::default();
        store.record_operation("add_track", true, Duration::from_millis(2));
        store.record_tracks_written(3);
    }
}
