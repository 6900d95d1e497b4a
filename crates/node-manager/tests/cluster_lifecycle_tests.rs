use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediaflow_config::NodeManagerConfig;
use mediaflow_domain::{
    ClusterTopology, CommandChannel, HealthStatus, Node, Service, ServiceId, ServiceState,
};
use mediaflow_errors::MediaflowResult;
use mediaflow_infrastructure::InMemoryCommandChannel;
use mediaflow_node_manager::{
    ClusterLifecycleCoordinator, LifecycleSettings, NodeManagerStartup, RetryPolicy,
};
use tokio::sync::oneshot;

fn settings() -> LifecycleSettings {
    LifecycleSettings {
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
        },
        command_timeout: Duration::from_secs(2),
        health_check_interval: Duration::ZERO,
        restart_on_health_failure: false,
    }
}

fn topology(nodes: usize, services_per_node: usize) -> ClusterTopology {
    ClusterTopology::new(
        (0..nodes)
            .map(|n| {
                Node::new(
                    format!("node-{n}"),
                    false,
                    (0..services_per_node)
                        .map(|s| Service::new(format!("Service{s}")))
                        .collect(),
                )
            })
            .collect(),
    )
    .unwrap()
}

fn coordinator(
    topology: ClusterTopology,
    channel: Arc<dyn CommandChannel>,
) -> Arc<ClusterLifecycleCoordinator> {
    Arc::new(ClusterLifecycleCoordinator::new(
        topology,
        channel,
        settings(),
        Duration::from_secs(5),
    ))
}

#[tokio::test]
async fn test_init_runs_when_any_service_runs() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let broken = ServiceId::new("node-0", "Service1");
    channel.fail_all_starts(&broken).await;
    let cluster = coordinator(topology(2, 2), channel.clone());

    let status = cluster.init(false).await.unwrap();

    assert!(status.running);
    assert!(cluster.is_running().await);
    assert_eq!(status.state_of(&broken), Some(ServiceState::Failed));
    assert_eq!(status.count_in(ServiceState::Running), 3);
    let failed = status
        .services
        .iter()
        .find(|s| s.service == broken)
        .unwrap();
    assert!(failed.last_error.is_some());
}

#[tokio::test]
async fn test_init_with_every_service_failing() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let topology = topology(2, 2);
    for id in topology.service_ids() {
        channel.fail_all_starts(&id).await;
    }
    let cluster = coordinator(topology.clone(), channel.clone());

    let status = cluster.init(false).await.unwrap();

    assert!(!status.running);
    assert!(!cluster.is_running().await);
    assert_eq!(status.count_in(ServiceState::Failed), 4);
    for id in topology.service_ids() {
        assert_eq!(channel.calls(&id).await.start, 2);
    }
}

#[tokio::test]
async fn test_init_of_empty_topology() {
    let cluster = coordinator(
        ClusterTopology::default(),
        Arc::new(InMemoryCommandChannel::new()),
    );
    let status = cluster.init(false).await.unwrap();
    assert!(!status.running);
    assert!(status.services.is_empty());
    cluster.stop().await;
}

/// 启动命令永不返回的节点
struct HangingChannel;

#[async_trait]
impl CommandChannel for HangingChannel {
    async fn start_service(&self, _id: &ServiceId, _service: &Service) -> MediaflowResult<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn stop_service(&self, _id: &ServiceId) -> MediaflowResult<()> {
        Ok(())
    }

    async fn check_health(&self, _id: &ServiceId) -> MediaflowResult<HealthStatus> {
        Ok(HealthStatus::NotRunning)
    }
}

#[tokio::test]
async fn test_service_timeout_marks_failed() {
    let mut slow_commands = settings();
    slow_commands.command_timeout = Duration::from_secs(3600);
    let cluster = ClusterLifecycleCoordinator::new(
        topology(1, 2),
        Arc::new(HangingChannel),
        slow_commands,
        Duration::from_millis(200),
    );

    let status = tokio::time::timeout(Duration::from_secs(5), cluster.init(false))
        .await
        .expect("init must be bounded by the service timeout")
        .unwrap();

    assert_eq!(status.count_in(ServiceState::Failed), 2);
    assert!(status
        .services
        .iter()
        .all(|s| s.last_error.as_deref().unwrap_or_default().contains("启动未在")));

    cluster.stop().await;
    assert_eq!(cluster.status().await.count_in(ServiceState::Stopped), 2);
}

/// 停止命令永不返回的节点
struct StuckStopChannel;

#[async_trait]
impl CommandChannel for StuckStopChannel {
    async fn start_service(&self, _id: &ServiceId, _service: &Service) -> MediaflowResult<()> {
        Ok(())
    }

    async fn stop_service(&self, _id: &ServiceId) -> MediaflowResult<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn check_health(&self, _id: &ServiceId) -> MediaflowResult<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }
}

#[tokio::test]
async fn test_stop_timeout_marks_failed() {
    let mut slow_commands = settings();
    slow_commands.command_timeout = Duration::from_secs(3600);
    let cluster = ClusterLifecycleCoordinator::new(
        topology(1, 2),
        Arc::new(StuckStopChannel),
        slow_commands,
        Duration::from_millis(200),
    );
    assert_eq!(cluster.init(false).await.unwrap().count_in(ServiceState::Running), 2);

    tokio::time::timeout(Duration::from_secs(5), cluster.stop())
        .await
        .expect("stop must be bounded by the service timeout");

    let status = cluster.status().await;
    assert_eq!(status.count_in(ServiceState::Failed), 2);
    assert!(!cluster.is_running().await);
    assert!(status
        .services
        .iter()
        .all(|s| s.last_error.as_deref().unwrap_or_default().contains("停止未在")));
}

#[tokio::test]
async fn test_resume_adopts_running_services() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let adopted = ServiceId::new("node-0", "Service0");
    channel.mark_running(&adopted).await;
    let cluster = coordinator(topology(1, 2), channel.clone());

    let status = cluster.init(true).await.unwrap();

    assert_eq!(status.count_in(ServiceState::Running), 2);
    assert_eq!(channel.calls(&adopted).await.start, 0);
    assert_eq!(
        channel
            .calls(&ServiceId::new("node-0", "Service1"))
            .await
            .start,
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stop_issues_single_stop_command() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let topology = topology(2, 3);
    let cluster = coordinator(topology.clone(), channel.clone());
    cluster.init(false).await.unwrap();
    channel.set_command_delay(Duration::from_millis(100)).await;

    let stops: Vec<_> = (0..8)
        .map(|_| {
            let cluster = Arc::clone(&cluster);
            tokio::spawn(async move { cluster.stop().await })
        })
        .collect();
    for stop in stops {
        stop.await.unwrap();
    }

    let status = cluster.status().await;
    assert_eq!(status.count_in(ServiceState::Stopped), 6);
    assert!(!cluster.is_running().await);
    for id in topology.service_ids() {
        assert_eq!(channel.calls(&id).await.stop, 1, "{id} stopped more than once");
    }
}

#[tokio::test]
async fn test_blocking_and_callback_stop_reach_same_state() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let cluster = coordinator(topology(1, 3), channel.clone());
    cluster.init(false).await.unwrap();
    channel.set_command_delay(Duration::from_millis(50)).await;

    let (done_tx, done_rx) = oneshot::channel();
    let handle = cluster.stop_with_callback(move || {
        let _ = done_tx.send(());
    });
    cluster.stop().await;

    tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .unwrap()
        .unwrap();
    handle.await.unwrap();

    let status = cluster.status().await;
    assert_eq!(status.count_in(ServiceState::Stopped), 3);
    for id in topology(1, 3).service_ids() {
        assert_eq!(channel.calls(&id).await.stop, 1);
    }
}

#[tokio::test]
async fn test_transitions_are_published() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let cluster = coordinator(topology(1, 1), channel);
    let mut transitions = cluster.subscribe();

    cluster.init(false).await.unwrap();
    cluster.stop().await;

    let mut seen = Vec::new();
    while let Ok(transition) = transitions.try_recv() {
        seen.push(transition.to);
    }
    assert_eq!(
        seen,
        vec![
            ServiceState::Starting,
            ServiceState::Running,
            ServiceState::Stopping,
            ServiceState::Stopped
        ]
    );
}

#[tokio::test]
async fn test_reconfigure_only_when_idle() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let cluster = coordinator(topology(1, 1), channel);
    cluster.init(false).await.unwrap();

    let err = cluster.reconfigure(topology(2, 2)).await.unwrap_err();
    assert!(err.is_validation());

    cluster.stop().await;
    cluster.reconfigure(topology(2, 2)).await.unwrap();
    assert_eq!(cluster.status().await.services.len(), 4);
    assert_eq!(cluster.topology().await.nodes().len(), 2);
    assert!(cluster
        .controller(&ServiceId::new("node-1", "Service1"))
        .await
        .is_some());
}

#[tokio::test]
async fn test_startup_hook_ignores_duplicate_shutdown() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let topology = topology(1, 2);
    let startup = NodeManagerStartup::new(
        coordinator(topology.clone(), channel.clone()),
        &NodeManagerConfig::default(),
    );

    let status = startup.start().await.unwrap().unwrap();
    assert!(status.running);
    assert!(startup.is_running().await);

    let callbacks = Arc::new(AtomicU32::new(0));
    let first = {
        let callbacks = Arc::clone(&callbacks);
        startup.stop_with(move || {
            callbacks.fetch_add(1, Ordering::SeqCst);
        })
    };
    let second = {
        let callbacks = Arc::clone(&callbacks);
        startup.stop_with(move || {
            callbacks.fetch_add(1, Ordering::SeqCst);
        })
    };
    first.await.unwrap();
    second.await.unwrap();
    startup.stop().await;

    assert_eq!(callbacks.load(Ordering::SeqCst), 2);
    assert!(!startup.is_running().await);
    for id in topology.service_ids() {
        assert_eq!(channel.calls(&id).await.stop, 1);
    }
}

#[tokio::test]
async fn test_disabled_startup_does_nothing() {
    let channel = Arc::new(InMemoryCommandChannel::new());
    let topology = topology(1, 1);
    let config = NodeManagerConfig {
        enabled: false,
        ..NodeManagerConfig::default()
    };
    let startup = NodeManagerStartup::new(coordinator(topology.clone(), channel.clone()), &config);

    assert!(startup.start().await.unwrap().is_none());
    assert!(!startup.is_running().await);
    assert_eq!(channel.calls(&topology.service_ids()[0]).await.start, 0);
}
