//! 节点命令通道抽象
//!
//! 启停命令与健康探测经由该端口投递到具体节点，底层传输可以是任意可靠的点对点或发布订阅机制。

use async_trait::async_trait;
use mediaflow_errors::MediaflowResult;

use crate::lifecycle::HealthStatus;
use crate::topology::{Service, ServiceId};

#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// 请求节点启动服务，返回表示节点已接受命令
    async fn start_service(&self, id: &ServiceId, service: &Service) -> MediaflowResult<()>;

    async fn stop_service(&self, id: &ServiceId) -> MediaflowResult<()>;

    async fn check_health(&self, id: &ServiceId) -> MediaflowResult<HealthStatus>;
}
