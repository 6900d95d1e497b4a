//! Redis 轨迹仓储
//!
//! 每个轨迹键对应一个 Redis 列表，元素为 JSON 编码的轨迹；作业索引集合记录该作业写过的全部列表键。
//! 读取时排序，因此结果只取决于内容而与写入顺序无关。

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mediaflow_config::TrackStoreConfig;
use mediaflow_domain::{Track, TrackJob, TrackKey, TrackRepository};
use mediaflow_errors::{MediaflowError, MediaflowResult};
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};
use tracing::{debug, error, info, instrument};

use crate::observability::TrackStoreMetrics;

/// 删除作业的全部列表键与索引集合。最后一个 KEYS 为索引键。
const CLEAR_JOB_SCRIPT: &str = r#"
local index = KEYS[#KEYS]
local indexed = redis.call('SMEMBERS', index)
local removed = 0
for i = 1, #KEYS - 1 do
    removed = removed + redis.call('DEL', KEYS[i])
end
for _, key in ipairs(indexed) do
    removed = removed + redis.call('DEL', key)
end
redis.call('DEL', index)
return removed
"#;

pub struct RedisTrackRepository {
    connection: ConnectionManager,
    key_prefix: String,
    command_timeout: Duration,
    clear_script: Script,
    metrics: TrackStoreMetrics,
}

impl RedisTrackRepository {
    pub async fn connect(config: &TrackStoreConfig) -> MediaflowResult<Self> {
        info!("Connecting track store to Redis at {}", config.redis_url);

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| MediaflowError::config_error(format!("无效的Redis URL: {e}")))?;

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let mut connection = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| {
                MediaflowError::store_unavailable(format!(
                    "连接Redis超时 ({}s)",
                    config.connection_timeout_seconds
                ))
            })?
            .map_err(map_redis_error)?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(map_redis_error)?;
        if pong != "PONG" {
            return Err(MediaflowError::store_unavailable(format!(
                "Unexpected PING response: {pong}"
            )));
        }

        debug!("Redis track store connection test successful");
        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
            command_timeout: timeout,
            clear_script: Script::new(CLEAR_JOB_SCRIPT),
            metrics: TrackStoreMetrics::new(),
        })
    }

    /// 超时视为后端不可达；每次调用记录指标
    async fn run<T, F>(&self, operation: &'static str, fut: F) -> MediaflowResult<T>
    where
        F: Future<Output = MediaflowResult<T>>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MediaflowError::store_unavailable(format!(
                "{operation} 在 {:?} 内未完成",
                self.command_timeout
            ))),
        };
        if let Err(e) = &result {
            error!(operation = operation, error = %e, "Track store operation failed");
        }
        self.metrics
            .record_operation(operation, result.is_ok(), started.elapsed());
        result
    }
}

#[async_trait]
impl TrackRepository for RedisTrackRepository {
    #[instrument(skip_all, fields(key = %track.key()))]
    async fn add_track(&self, track: &Track) -> MediaflowResult<()> {
        track.ensure_storable()?;
        let key = tracks_key(&self.key_prefix, &track.key());
        let index = job_index_key(&self.key_prefix, track.job_id);
        let payload = serde_json::to_string(track)?;
        let mut conn = self.connection.clone();

        self.run("add_track", async move {
            redis::pipe()
                .atomic()
                .rpush(&key, payload)
                .ignore()
                .sadd(&index, &key)
                .ignore()
                .query_async::<()>(&mut conn)
                .await
                .map_err(map_redis_error)
        })
        .await?;
        self.metrics.record_tracks_written(1);
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key, count = tracks.len()))]
    async fn set_tracks(&self, key: &TrackKey, tracks: &[Track]) -> MediaflowResult<()> {
        key.ensure_owns(tracks)?;
        tracks.iter().try_for_each(Track::ensure_storable)?;

        let list_key = tracks_key(&self.key_prefix, key);
        let index = job_index_key(&self.key_prefix, key.job_id);
        let payloads = tracks
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let count = payloads.len();
        let mut conn = self.connection.clone();

        self.run("set_tracks", async move {
            let mut pipe = redis::pipe();
            pipe.atomic().del(&list_key).ignore();
            if !payloads.is_empty() {
                pipe.rpush(&list_key, payloads)
                    .ignore()
                    .sadd(&index, &list_key)
                    .ignore();
            }
            pipe.query_async::<()>(&mut conn)
                .await
                .map_err(map_redis_error)
        })
        .await?;
        self.metrics.record_tracks_written(count);
        debug!("Replaced tracks at {} with {} entries", key, count);
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn get_tracks(&self, key: &TrackKey) -> MediaflowResult<Vec<Track>> {
        let list_key = tracks_key(&self.key_prefix, key);
        let mut conn = self.connection.clone();

        self.run("get_tracks", async move {
            let raw: Vec<String> = redis::cmd("LRANGE")
                .arg(&list_key)
                .arg(0)
                .arg(-1)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;

            let mut tracks = raw
                .iter()
                .map(|element| serde_json::from_str::<Track>(element))
                .collect::<Result<Vec<_>, _>>()?;
            tracks.sort();
            Ok::<_, MediaflowError>(tracks)
        })
        .await
    }

    #[instrument(skip_all, fields(job_id = job.job_id))]
    async fn clear_tracks(&self, job: &TrackJob) -> MediaflowResult<()> {
        let keys: Vec<String> = job
            .keys()
            .iter()
            .map(|key| tracks_key(&self.key_prefix, key))
            .collect();
        let index = job_index_key(&self.key_prefix, job.job_id);
        let mut conn = self.connection.clone();

        let removed: i64 = self
            .run("clear_tracks", async {
                let mut invocation = self.clear_script.prepare_invoke();
                for key in &keys {
                    invocation.key(key);
                }
                invocation.key(&index);
                invocation
                    .invoke_async::<i64>(&mut conn)
                    .await
                    .map_err(map_redis_error)
            })
            .await?;
        info!("Cleared {} track lists for job {}", removed, job.job_id);
        Ok(())
    }
}

pub(crate) fn tracks_key(prefix: &str, key: &TrackKey) -> String {
    format!(
        "{}:job:{}:media:{}:task:{}:action:{}:tracks",
        prefix, key.job_id, key.media_id, key.task_index, key.action_index
    )
}

pub(crate) fn job_index_key(prefix: &str, job_id: i64) -> String {
    format!("{prefix}:job:{job_id}:tracks:index")
}

/// 连接类故障视为后端不可达，其余为命令被拒绝
fn map_redis_error(e: RedisError) -> MediaflowError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        MediaflowError::store_unavailable(e.to_string())
    } else {
        MediaflowError::TrackStore(e.to_string())
    }
}
