use std::sync::Weak;
use std::time::Duration;

use mediaflow_domain::ServiceState;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::{ControllerInner, HealthCheckOutcome, ServiceLifecycleController};

/// 每个 RUNNING 周期一个监控任务；收到关闭信号、服务离开 RUNNING 或控制器被释放时退出
pub(crate) fn spawn_monitor(
    controller: Weak<ControllerInner>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Health monitor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(inner) = controller.upgrade() else {
                        break;
                    };
                    let controller = ServiceLifecycleController::from_inner(inner);

                    match controller.health_check().await {
                        HealthCheckOutcome::Healthy => {}
                        HealthCheckOutcome::Skipped => {
                            if controller.state() != ServiceState::Running {
                                break;
                            }
                        }
                        HealthCheckOutcome::Failed(status) => {
                            // 失败迁移不改变运行周期，这里读到的就是失败时的周期
                            let failed_epoch = controller.running_epoch();
                            if controller.settings().restart_on_health_failure
                                && !controller.stop_requested()
                            {
                                info!(
                                    "Restarting {} after health check reported {:?}",
                                    controller.id(),
                                    status
                                );
                                if let Err(e) =
                                    controller.restart_after_health_failure(failed_epoch).await
                                {
                                    warn!("Restart of {} failed: {}", controller.id(), e);
                                }
                            }
                            break;
                        }
                    }
                }
            }
        }
    });
}
