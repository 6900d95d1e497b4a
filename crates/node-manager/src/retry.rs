use std::time::Duration;

use mediaflow_config::LifecycleConfig;

/// 启动重试的有界指数退避
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// 抖动幅度占退避时长的比例
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for RetryPolicy {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            max_attempts: config.max_start_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier,
            jitter_factor: config.jitter_factor,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的基础等待时长：`initial * multiplier^(attempt-1)`，不超过上限
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// 加入随机抖动，避免大量服务同时重试
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt).as_millis() as f64;
        let jitter = base * self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        let millis = (base + jitter).clamp(0.0, self.max_backoff.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}
