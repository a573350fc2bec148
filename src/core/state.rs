//! 状态定义：AgentPhase 与展示层快照
//!
//! 展示层只持有 AgentSnapshot（阶段、消息、计划、当前工具调用、工作区产物）；
//! 完整状态由 ConversationDriver 维护并投影到快照。

use serde::{Deserialize, Serialize};

use crate::memory::{ChatSession, Message};
use crate::plan::PlanStep;
use crate::react::AgentEvent;
use crate::tools::{FileArtifact, ToolCall, WebContent};

/// 驱动器阶段；Idle 既是初始态也是终态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    #[default]
    Idle,
    Planning,
    Executing,
    /// 鉴权失败后宿主等待用户更换凭据；回合循环本身不进入该阶段
    WaitingOnUser,
}

/// 展示层看到的只读快照
#[derive(Clone, Debug, Default, Serialize)]
pub struct AgentSnapshot {
    pub phase: AgentPhase,
    pub session_id: Option<String>,
    pub session_name: Option<String>,
    pub messages: Vec<Message>,
    pub plan: Vec<PlanStep>,
    pub active_tool_call: Option<ToolCall>,
    pub files: Vec<FileArtifact>,
    pub last_web_content: Option<WebContent>,
    pub viewer_open: bool,
    /// 会话列表（收藏优先，其次按创建时间倒序）
    pub sessions: Vec<SessionSummary>,
}

impl AgentSnapshot {
    /// 回合进行中按过程事件增量更新快照
    pub fn apply(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::PhaseChanged { phase } => self.phase = *phase,
            AgentEvent::MessageAppended { message } => self.messages.push(message.clone()),
            AgentEvent::PlanUpdated { steps } => self.plan = steps.clone(),
            AgentEvent::ToolCallStarted { call } => self.active_tool_call = Some(call.clone()),
            AgentEvent::ToolCallFinished { .. } => self.active_tool_call = None,
            AgentEvent::ViewerRevealed => self.viewer_open = true,
            AgentEvent::FileWritten { file } => {
                match self.files.iter_mut().find(|f| f.name == file.name) {
                    Some(existing) => *existing = file.clone(),
                    None => self.files.push(file.clone()),
                }
            }
            AgentEvent::WebContentLoaded { content } => {
                self.last_web_content = Some(content.clone())
            }
            AgentEvent::SessionTitled { session_id, name } => {
                if self.session_id.as_deref() == Some(session_id.as_str()) {
                    self.session_name = Some(name.clone());
                }
                if let Some(entry) = self.sessions.iter_mut().find(|s| &s.id == session_id) {
                    entry.name = name.clone();
                }
            }
            AgentEvent::RoundStarted { .. } | AgentEvent::SubmissionRejected { .. } => {}
        }
    }
}

/// 会话列表条目
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub is_favorite: bool,
    pub created_at: i64,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            is_favorite: session.is_favorite,
            created_at: session.created_at,
        }
    }
}
