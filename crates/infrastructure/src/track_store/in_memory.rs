use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use mediaflow_domain::{Track, TrackJob, TrackKey, TrackRepository};
use mediaflow_errors::{MediaflowError, MediaflowResult};
use tokio::sync::RwLock;
use tracing::debug;

use crate::observability::TrackStoreMetrics;

/// 内存轨迹仓储
///
/// 适用于嵌入式部署与测试。写锁保证单个操作的原子性；`set_available(false)`
/// 模拟后端不可达，此时全部操作返回 `StoreUnavailable`。
pub struct InMemoryTrackRepository {
    tracks: RwLock<HashMap<TrackKey, Vec<Track>>>,
    available: AtomicBool,
    metrics: TrackStoreMetrics,
}

impl Default for InMemoryTrackRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTrackRepository {
    pub fn new() -> Self {
        Self {
            tracks: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            metrics: TrackStoreMetrics::new(),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 当前保存的键数量
    pub async fn key_count(&self) -> usize {
        self.tracks.read().await.len()
    }

    fn ensure_available(&self) -> MediaflowResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MediaflowError::store_unavailable("内存轨迹仓储已被标记为不可用"))
        }
    }

    fn finish<T>(&self, operation: &'static str, started: Instant, result: MediaflowResult<T>) -> MediaflowResult<T> {
        self.metrics
            .record_operation(operation, result.is_ok(), started.elapsed());
        result
    }
}

#[async_trait]
impl TrackRepository for InMemoryTrackRepository {
    async fn add_track(&self, track: &Track) -> MediaflowResult<()> {
        let started = Instant::now();
        let result = async {
            self.ensure_available()?;
            track.ensure_storable()?;
            let mut tracks = self.tracks.write().await;
            tracks.entry(track.key()).or_default().push(track.clone());
            self.metrics.record_tracks_written(1);
            Ok::<_, MediaflowError>(())
        }
        .await;
        self.finish("add_track", started, result)
    }

    async fn set_tracks(&self, key: &TrackKey, tracks: &[Track]) -> MediaflowResult<()> {
        let started = Instant::now();
        let result = async {
            self.ensure_available()?;
            key.ensure_owns(tracks)?;
            tracks.iter().try_for_each(Track::ensure_storable)?;
            let mut stored = self.tracks.write().await;
            if tracks.is_empty() {
                stored.remove(key);
            } else {
                stored.insert(*key, tracks.to_vec());
            }
            self.metrics.record_tracks_written(tracks.len());
            debug!("Replaced tracks at {} with {} entries", key, tracks.len());
            Ok::<_, MediaflowError>(())
        }
        .await;
        self.finish("set_tracks", started, result)
    }

    async fn get_tracks(&self, key: &TrackKey) -> MediaflowResult<Vec<Track>> {
        let started = Instant::now();
        let result = async {
            self.ensure_available()?;
            let mut tracks = self
                .tracks
                .read()
                .await
                .get(key)
                .cloned()
                .unwrap_or_default();
            tracks.sort();
            Ok::<_, MediaflowError>(tracks)
        }
        .await;
        self.finish("get_tracks", started, result)
    }

    async fn clear_tracks(&self, job: &TrackJob) -> MediaflowResult<()> {
        let started = Instant::now();
        let result = async {
            self.ensure_available()?;
            let mut tracks = self.tracks.write().await;
            let before = tracks.len();
            tracks.retain(|key, _| key.job_id != job.job_id);
            debug!(
                "Cleared {} track keys for job {}",
                before - tracks.len(),
                job.job_id
            );
            Ok::<_, MediaflowError>(())
        }
        .await;
        self.finish("clear_tracks", started, result)
    }
}
