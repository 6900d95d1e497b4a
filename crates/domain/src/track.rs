//! 检测轨迹模型
//!
//! 轨迹的排序只取决于内容而与写入顺序无关：先比较帧范围与时间范围，再比较类型、置信度、
//! 检测序列与属性，最后比较所属键。相等即排序相等。

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use mediaflow_errors::{MediaflowError, MediaflowResult};
use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineSchema;

/// 轨迹仓储键：(作业, 媒体, 任务序号, 动作序号)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackKey {
    pub job_id: i64,
    pub media_id: i64,
    pub task_index: usize,
    pub action_index: usize,
}

impl TrackKey {
    pub fn new(job_id: i64, media_id: i64, task_index: usize, action_index: usize) -> Self {
        Self {
            job_id,
            media_id,
            task_index,
            action_index,
        }
    }

    /// 确认每条轨迹都属于该键
    pub fn ensure_owns(&self, tracks: &[Track]) -> MediaflowResult<()> {
        match tracks.iter().find(|track| track.key() != *self) {
            Some(stray) => Err(MediaflowError::validation_error(format!(
                "轨迹键 {} 与目标键 {} 不一致",
                stray.key(),
                self
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.job_id, self.media_id, self.task_index, self.action_index
        )
    }
}

/// 单帧检测结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
    pub media_offset_frame: i64,
    pub media_offset_time: i64,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Detection {
    pub fn new(
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        confidence: f32,
        media_offset_frame: i64,
        media_offset_time: i64,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            media_offset_frame,
            media_offset_time,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl Ord for Detection {
    fn cmp(&self, other: &Self) -> Ordering {
        self.media_offset_frame
            .cmp(&other.media_offset_frame)
            .then_with(|| self.media_offset_time.cmp(&other.media_offset_time))
            .then_with(|| self.x.cmp(&other.x))
            .then_with(|| self.y.cmp(&other.y))
            .then_with(|| self.width.cmp(&other.width))
            .then_with(|| self.height.cmp(&other.height))
            .then_with(|| self.confidence.total_cmp(&other.confidence))
            .then_with(|| self.properties.cmp(&other.properties))
    }
}

impl PartialOrd for Detection {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Detection {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Detection {}

/// 一个流水线阶段对一个媒体产出的检测轨迹
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub job_id: i64,
    pub media_id: i64,
    pub task_index: usize,
    pub action_index: usize,
    pub start_offset_frame: i64,
    pub stop_offset_frame: i64,
    pub start_offset_time: i64,
    pub stop_offset_time: i64,
    pub track_type: String,
    pub confidence: f32,
    #[serde(default)]
    pub detections: BTreeSet<Detection>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Track {
    pub fn new(
        key: TrackKey,
        track_type: impl Into<String>,
        frames: (i64, i64),
        times: (i64, i64),
        confidence: f32,
    ) -> Self {
        Self {
            job_id: key.job_id,
            media_id: key.media_id,
            task_index: key.task_index,
            action_index: key.action_index,
            start_offset_frame: frames.0,
            stop_offset_frame: frames.1,
            start_offset_time: times.0,
            stop_offset_time: times.1,
            track_type: track_type.into(),
            confidence,
            detections: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    /// 由检测序列推导帧范围、时间范围与置信度（取检测最大值）
    pub fn from_detections<I>(key: TrackKey, track_type: impl Into<String>, detections: I) -> MediaflowResult<Self>
    where
        I: IntoIterator<Item = Detection>,
    {
        let detections: BTreeSet<Detection> = detections.into_iter().collect();
        let (Some(first), Some(last)) = (detections.first(), detections.last()) else {
            return Err(MediaflowError::validation_error("轨迹至少需要一个检测结果"));
        };

        let start_time = detections.iter().map(|d| d.media_offset_time).min().unwrap_or(first.media_offset_time);
        let stop_time = detections.iter().map(|d| d.media_offset_time).max().unwrap_or(last.media_offset_time);
        let confidence = detections
            .iter()
            .map(|d| d.confidence)
            .max_by(f32::total_cmp)
            .unwrap_or(first.confidence);

        let mut track = Track::new(
            key,
            track_type,
            (first.media_offset_frame, last.media_offset_frame),
            (start_time, stop_time),
            confidence,
        );
        track.detections = detections;
        Ok(track)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.job_id, self.media_id, self.task_index, self.action_index)
    }

    /// 写入仓储前的检查：JSON 无法表示 NaN 与无穷大，这样的轨迹写入后整个键都将无法读取
    pub fn ensure_storable(&self) -> MediaflowResult<()> {
        if !self.confidence.is_finite() {
            return Err(MediaflowError::validation_error(format!(
                "轨迹 {} 的置信度不是有限数: {}",
                self.key(),
                self.confidence
            )));
        }
        match self.detections.iter().find(|d| !d.confidence.is_finite()) {
            Some(detection) => Err(MediaflowError::validation_error(format!(
                "轨迹 {} 第 {} 帧检测的置信度不是有限数: {}",
                self.key(),
                detection.media_offset_frame,
                detection.confidence
            ))),
            None => Ok(()),
        }
    }

    /// 置信度最高的检测，并列时取最早的帧
    pub fn exemplar(&self) -> Option<&Detection> {
        self.detections.iter().fold(None, |best, detection| match best {
            Some(current) if detection.confidence.total_cmp(&current.confidence) != Ordering::Greater => {
                Some(current)
            }
            _ => Some(detection),
        })
    }
}

impl Ord for Track {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_offset_frame
            .cmp(&other.start_offset_frame)
            .then_with(|| self.stop_offset_frame.cmp(&other.stop_offset_frame))
            .then_with(|| self.start_offset_time.cmp(&other.start_offset_time))
            .then_with(|| self.stop_offset_time.cmp(&other.stop_offset_time))
            .then_with(|| self.track_type.cmp(&other.track_type))
            .then_with(|| self.confidence.total_cmp(&other.confidence))
            .then_with(|| self.detections.iter().cmp(other.detections.iter()))
            .then_with(|| self.properties.cmp(&other.properties))
            .then_with(|| self.key().cmp(&other.key()))
    }
}

impl PartialOrd for Track {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Track {}

/// 清理轨迹时描述作业范围：作业的全部媒体与流水线全部阶段
#[derive(Debug, Clone)]
pub struct TrackJob {
    pub job_id: i64,
    pub media_ids: Vec<i64>,
    pub pipeline: PipelineSchema,
}

impl TrackJob {
    pub fn new(job_id: i64, media_ids: Vec<i64>, pipeline: PipelineSchema) -> Self {
        Self {
            job_id,
            media_ids,
            pipeline,
        }
    }

    pub fn keys(&self) -> Vec<TrackKey> {
        self.media_ids
            .iter()
            .flat_map(|&media_id| {
                self.pipeline.stages().map(move |(task_index, action_index)| {
                    TrackKey::new(self.job_id, media_id, task_index, action_index)
                })
            })
            .collect()
    }
}
