use std::time::Duration;

use async_trait::async_trait;
use mediaflow_config::ChannelConfig;
use mediaflow_domain::{CommandChannel, HealthStatus, Service, ServiceId};
use mediaflow_errors::{MediaflowError, MediaflowResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// 通过节点代理的 HTTP 接口投递命令
///
/// `POST http://{node}:{port}/services/{name}/start|stop`，`GET .../health`。
pub struct HttpCommandChannel {
    node_port: u16,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: HealthStatus,
}

impl HttpCommandChannel {
    pub fn new(config: &ChannelConfig) -> MediaflowResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| MediaflowError::config_error(format!("无法创建HTTP客户端: {e}")))?;
        Ok(Self {
            node_port: config.node_port,
            http_client,
        })
    }

    fn service_url(&self, id: &ServiceId, action: &str) -> String {
        format!(
            "http://{}:{}/services/{}/{}",
            id.node, self.node_port, id.service, action
        )
    }
}

fn request_error(id: &ServiceId, e: reqwest::Error) -> MediaflowError {
    if e.is_timeout() {
        MediaflowError::timeout_error(format!("{id}: {e}"))
    } else {
        MediaflowError::channel_error(format!("{id}: {e}"))
    }
}

#[async_trait]
impl CommandChannel for HttpCommandChannel {
    async fn start_service(&self, id: &ServiceId, service: &Service) -> MediaflowResult<()> {
        let url = self.service_url(id, "start");
        let body = json!({
            "launcher": service.launcher,
            "args": service.args,
        });

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(id, e))?;

        if response.status().is_success() {
            info!("Node accepted start command for {}", id);
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Start command for {} rejected: HTTP {} - {}", id, status, body);
            Err(MediaflowError::channel_error(format!(
                "{id} 启动命令被拒绝: HTTP {status} - {body}"
            )))
        }
    }

    async fn stop_service(&self, id: &ServiceId) -> MediaflowResult<()> {
        let url = self.service_url(id, "stop");
        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| request_error(id, e))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            debug!("Node confirmed stop of {} (HTTP {})", id, status);
            Ok(())
        } else {
            Err(MediaflowError::channel_error(format!(
                "{id} 停止命令被拒绝: HTTP {status}"
            )))
        }
    }

    async fn check_health(&self, id: &ServiceId) -> MediaflowResult<HealthStatus> {
        let url = self.service_url(id, "health");
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(id, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(HealthStatus::NotRunning);
        }
        if !response.status().is_success() {
            return Ok(HealthStatus::Unhealthy);
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| MediaflowError::channel_error(format!("{id} 健康响应无法解析: {e}")))?;
        Ok(health.status)
    }
}
