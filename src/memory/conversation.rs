//! 对话消息与会话
//!
//! Message 创建后不可变，按顺序追加到 ChatSession 的消息列表；ChatSession 由宿主持有，
//! 驱动器只在回合中读写其 messages。

use serde::{Deserialize, Serialize};

/// 新会话在标题生成完成前的占位名
pub const DEFAULT_SESSION_NAME: &str = "New Task";

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix 毫秒
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            timestamp: now_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content)
    }
}

/// 一次会话：有序消息 + 元数据（名称、收藏）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub name: String,
    pub messages: Vec<Message>,
    pub created_at: i64,
    #[serde(default)]
    pub is_favorite: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: new_id(),
            name: DEFAULT_SESSION_NAME.to_string(),
            messages: Vec::new(),
            created_at: now_millis(),
            is_favorite: false,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
