//! 计划数据类型：步骤、动作及其状态

use serde::{Deserialize, Deserializer, Serialize};

/// 步骤状态（快照视图；active 由 PlanCursor 推导）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

/// 动作类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Command,
    File,
    Info,
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Running,
    Completed,
    Failed,
}

/// 步骤下的一条动作日志
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub content: String,
    pub status: ActionStatus,
    pub timestamp: i64,
}

/// 尚未分配 id / timestamp 的动作
#[derive(Clone, Debug, PartialEq)]
pub struct ActionDraft {
    pub kind: ActionKind,
    pub content: String,
    pub status: ActionStatus,
}

impl ActionDraft {
    pub fn running(kind: ActionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            status: ActionStatus::Running,
        }
    }

    pub fn completed(kind: ActionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            status: ActionStatus::Completed,
        }
    }
}

/// 计划步骤快照
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: StepStatus,
    pub actions: Vec<PlanAction>,
}

/// create_plan 中的单个步骤（title 必填；缺失或 null 视为空串，由 replace_plan 校验）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDraft {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl StepDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}
