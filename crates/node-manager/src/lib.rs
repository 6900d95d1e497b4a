//! 集群节点与服务生命周期管理
//!
//! 每个声明的服务由一个 [`ServiceLifecycleController`] 驱动，
//! [`ClusterLifecycleCoordinator`] 聚合全部控制器，[`NodeManagerStartup`] 把它接入宿主进程的启停流程。

pub mod controller;
pub mod coordinator;
mod health;
pub mod retry;
pub mod startup;
pub mod topology;

pub use controller::{HealthCheckOutcome, LifecycleSettings, ServiceLifecycleController};
pub use coordinator::ClusterLifecycleCoordinator;
pub use retry::RetryPolicy;
pub use startup::NodeManagerStartup;
pub use topology::load_topology;
