//! 领域仓储抽象

use async_trait::async_trait;
use mediaflow_errors::MediaflowResult;

use crate::track::{Track, TrackJob, TrackKey};

/// 轨迹仓储抽象
///
/// 每个操作单独原子；跨操作不提供事务。后端不可达时全部操作返回
/// [`MediaflowError::StoreUnavailable`](mediaflow_errors::MediaflowError::StoreUnavailable)，
/// 仓储自身不重试。
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// 追加到轨迹自身携带的键，并发追加不丢写，不去重
    async fn add_track(&self, track: &Track) -> MediaflowResult<()>;

    /// 以 `tracks` 整体替换该键的内容。调用方保证不与同键的 `add_track` 并发
    async fn set_tracks(&self, key: &TrackKey, tracks: &[Track]) -> MediaflowResult<()>;

    /// 按轨迹全序排序后的快照；未写过的键返回空集合
    async fn get_tracks(&self, key: &TrackKey) -> MediaflowResult<Vec<Track>>;

    /// 删除作业下所有媒体、所有阶段的轨迹，幂等
    async fn clear_tracks(&self, job: &TrackJob) -> MediaflowResult<()>;
}
