//! 流水线定义模型
//!
//! 流水线是有序的任务列表，任务是有序的动作列表。任务在流水线中的位置即
//! `task_index`，动作在任务中的位置即 `action_index`，二者共同定位一个流水线阶段，
//! 也是轨迹仓储键的组成部分。

use mediaflow_errors::{MediaflowError, MediaflowResult};
use serde::{Deserialize, Serialize};

use crate::track::TrackKey;

/// 流水线任务
///
/// 构造时完成校验与规范化，非法的任务无法存在；构造后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TaskDefinition")]
pub struct Task {
    name: String,
    description: String,
    actions: Vec<String>,
}

/// 未经校验的任务文档形态
#[derive(Debug, Clone, Deserialize)]
struct TaskDefinition {
    name: String,
    description: String,
    actions: Vec<String>,
}

impl TryFrom<TaskDefinition> for Task {
    type Error = MediaflowError;

    fn try_from(def: TaskDefinition) -> Result<Self, Self::Error> {
        Task::new(def.name, def.description, def.actions)
    }
}

impl Task {
    /// 名称去空白并转大写；描述去空白；动作逐个去空白并转大写，保留顺序与重复项
    pub fn new<I, S>(name: impl AsRef<str>, description: impl AsRef<str>, actions: I) -> MediaflowResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = trim_and_upper(name.as_ref());
        if name.is_empty() {
            return Err(MediaflowError::validation_error("任务名称不能为空"));
        }

        let description = description.as_ref().trim().to_string();
        if description.is_empty() {
            return Err(MediaflowError::validation_error(format!(
                "任务 {name} 的描述不能为空"
            )));
        }

        let mut normalized = Vec::new();
        for (index, action) in actions.into_iter().enumerate() {
            let action = trim_and_upper(action.as_ref());
            if action.is_empty() {
                return Err(MediaflowError::validation_error(format!(
                    "任务 {name} 的第 {index} 个动作名称为空"
                )));
            }
            normalized.push(action);
        }
        if normalized.is_empty() {
            return Err(MediaflowError::validation_error(format!(
                "任务 {name} 至少需要一个动作"
            )));
        }

        Ok(Self {
            name,
            description,
            actions: normalized,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }
}

fn trim_and_upper(value: &str) -> String {
    value.trim().to_uppercase()
}

/// 已解析、已校验的流水线，提供 `(task_index, action_index)` 坐标空间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PipelineDefinition")]
pub struct PipelineSchema {
    name: String,
    description: String,
    tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize)]
struct PipelineDefinition {
    name: String,
    #[serde(default)]
    description: String,
    tasks: Vec<Task>,
}

impl TryFrom<PipelineDefinition> for PipelineSchema {
    type Error = MediaflowError;

    fn try_from(def: PipelineDefinition) -> Result<Self, Self::Error> {
        PipelineSchema::new(def.name, def.description, def.tasks)
    }
}

impl PipelineSchema {
    pub fn new(
        name: impl AsRef<str>,
        description: impl AsRef<str>,
        tasks: Vec<Task>,
    ) -> MediaflowResult<Self> {
        let name = trim_and_upper(name.as_ref());
        if name.is_empty() {
            return Err(MediaflowError::validation_error("流水线名称不能为空"));
        }
        if tasks.is_empty() {
            return Err(MediaflowError::validation_error(format!(
                "流水线 {name} 至少需要一个任务"
            )));
        }
        Ok(Self {
            name,
            description: description.as_ref().trim().to_string(),
            tasks,
        })
    }

    /// 解析 JSON 流水线文档，每个任务都经过 [`Task::new`] 校验
    pub fn from_json(document: &str) -> MediaflowResult<Self> {
        serde_json::from_str(document).map_err(|e| {
            MediaflowError::validation_error(format!("流水线文档无效: {e}"))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_index: usize) -> Option<&Task> {
        self.tasks.get(task_index)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn action_count(&self, task_index: usize) -> Option<usize> {
        self.task(task_index).map(|task| task.actions().len())
    }

    /// 返回该阶段的动作名称
    pub fn action(&self, task_index: usize, action_index: usize) -> Option<&str> {
        self.task(task_index)
            .and_then(|task| task.actions().get(action_index))
            .map(String::as_str)
    }

    pub fn contains(&self, task_index: usize, action_index: usize) -> bool {
        self.action(task_index, action_index).is_some()
    }

    /// 按流水线顺序枚举全部阶段坐标
    pub fn stages(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.tasks.iter().enumerate().flat_map(|(task_index, task)| {
            (0..task.actions().len()).map(move |action_index| (task_index, action_index))
        })
    }

    pub fn validate_key(&self, key: &TrackKey) -> MediaflowResult<()> {
        if self.contains(key.task_index, key.action_index) {
            Ok(())
        } else {
            Err(MediaflowError::validation_error(format!(
                "流水线 {} 中不存在阶段 ({}, {})",
                self.name, key.task_index, key.action_index
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_normalizes_inputs() {
        let task = Task::new(
            "  face detection task ",
            "  Runs face detection.  ",
            vec![" ocv face action", "dlib face action  "],
        )
        .unwrap();

        assert_eq!(task.name(), "FACE DETECTION TASK");
        assert_eq!(task.description(), "Runs face detection.");
        assert_eq!(task.actions(), ["OCV FACE ACTION", "DLIB FACE ACTION"]);
    }

    #[test]
    fn test_task_preserves_duplicate_actions() {
        let task = Task::new("t", "d", vec!["a", " A ", "b"]).unwrap();
        assert_eq!(task.actions(), ["A", "A", "B"]);
    }

    #[test]
    fn test_task_rejects_blank_fields() {
        assert!(Task::new("   ", "d", vec!["a"]).unwrap_err().is_validation());
        assert!(Task::new("t", " \t ", vec!["a"]).unwrap_err().is_validation());
        assert!(Task::new("t", "d", Vec::<String>::new())
            .unwrap_err()
            .is_validation());
        assert!(Task::new("t", "d", vec!["a", "  "]).unwrap_err().is_validation());
    }

    #[test]
    fn test_task_equality_covers_all_fields() {
        let a = Task::new("t", "d", vec!["x"]).unwrap();
        assert_eq!(a, Task::new(" T ", "d ", vec![" x"]).unwrap());
        assert_ne!(a, Task::new("t", "other", vec!["x"]).unwrap());
        assert_ne!(a, Task::new("t", "d", vec!["x", "y"]).unwrap());
    }

    #[test]
    fn test_task_deserialization_validates() {
        let task: Task =
            serde_json::from_str(r#"{"name":" t ","description":"d","actions":["a"]}"#).unwrap();
        assert_eq!(task.name(), "T");

        let invalid = serde_json::from_str::<Task>(r#"{"name":"t","description":"d","actions":[]}"#);
        assert!(invalid.is_err());
    }

    fn sample_pipeline() -> PipelineSchema {
        PipelineSchema::from_json(
            r#"{
                "name": "face pipeline",
                "description": "faces then markup",
                "tasks": [
                    {"name": "face", "description": "detect", "actions": ["ocv face", "dlib face"]},
                    {"name": "markup", "description": "draw", "actions": ["markup"]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_coordinates() {
        let pipeline = sample_pipeline();
        assert_eq!(pipeline.name(), "FACE PIPELINE");
        assert_eq!(pipeline.task_count(), 2);
        assert_eq!(pipeline.action_count(0), Some(2));
        assert_eq!(pipeline.action_count(2), None);
        assert_eq!(pipeline.action(0, 1), Some("DLIB FACE"));
        assert!(pipeline.contains(1, 0));
        assert!(!pipeline.contains(1, 1));
        assert_eq!(pipeline.stages().collect::<Vec<_>>(), vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn test_pipeline_validate_key() {
        let pipeline = sample_pipeline();
        assert!(pipeline.validate_key(&TrackKey::new(1, 2, 0, 1)).is_ok());
        assert!(pipeline
            .validate_key(&TrackKey::new(1, 2, 3, 0))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_pipeline_rejects_invalid_documents() {
        assert!(PipelineSchema::from_json(r#"{"name":"p","tasks":[]}"#).is_err());
        assert!(PipelineSchema::from_json(
            r#"{"name":"p","tasks":[{"name":"t","description":"","actions":["a"]}]}"#
        )
        .is_err());
        assert!(PipelineSchema::from_json("not json").is_err());
    }
}
