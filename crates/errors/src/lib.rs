use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaflowError {
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("服务启动失败: {service} 在 {attempts} 次尝试后仍未运行 - {reason}")]
    ServiceStart {
        service: String,
        attempts: u32,
        reason: String,
    },
    #[error("轨迹存储不可用: {0}")]
    StoreUnavailable(String),
    #[error("轨迹存储命令失败: {0}")]
    TrackStore(String),
    #[error("重复的节点: {target}")]
    DuplicateNode { target: String },
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("命令通道错误: {0}")]
    CommandChannel(String),
    #[error("操作超时: {0}")]
    Timeout(String),
}

pub type MediaflowResult<T> = Result<T, MediaflowError>;

impl MediaflowError {
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn store_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::StoreUnavailable(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn channel_error<S: Into<String>>(msg: S) -> Self {
        Self::CommandChannel(msg.into())
    }
    pub fn timeout_error<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }
    pub fn duplicate_node<S: Into<String>>(target: S) -> Self {
        Self::DuplicateNode {
            target: target.into(),
        }
    }
    pub fn service_start<S: Into<String>, R: Into<String>>(
        service: S,
        attempts: u32,
        reason: R,
    ) -> Self {
        Self::ServiceStart {
            service: service.into(),
            attempts,
            reason: reason.into(),
        }
    }
    /// 构造期校验错误，对象不可能以非法状态存在
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MediaflowError::Validation(_) | MediaflowError::DuplicateNode { .. }
        )
    }
    /// 轨迹存储失败不在仓储内部重试，由调用方（流水线阶段）决定
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaflowError::CommandChannel(_) | MediaflowError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for MediaflowError {
    fn from(err: serde_json::Error) -> Self {
        MediaflowError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests;
