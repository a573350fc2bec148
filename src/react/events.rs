//! 回合过程事件：供展示层实时渲染阶段、消息、计划与工具调用

use serde::Serialize;
use tokio::sync::{mpsc::UnboundedSender, watch};

use crate::core::{AgentPhase, AgentSnapshot};
use crate::memory::Message;
use crate::plan::PlanStep;
use crate::tools::{FileArtifact, ToolCall, WebContent};

/// 单个过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 驱动器阶段变化
    PhaseChanged { phase: AgentPhase },
    /// 与模型往返一轮（当前第几轮）
    RoundStarted { round: usize, max_rounds: usize },
    MessageAppended { message: Message },
    /// 计划任意变更后的完整快照
    PlanUpdated { steps: Vec<PlanStep> },
    ToolCallStarted { call: ToolCall },
    ToolCallFinished { call: ToolCall },
    /// 结果查看器从关闭变为打开（已打开时不会重复发送）
    ViewerRevealed,
    FileWritten { file: FileArtifact },
    WebContentLoaded { content: WebContent },
    /// 回合进行中收到的新提交被拒绝
    SubmissionRejected { text: String },
    /// 新会话标题生成完成
    SessionTitled { session_id: String, name: String },
}

/// 事件出口：过程事件通道 + 展示层快照
///
/// 快照在回合边界由宿主整体替换（publish），回合进行中按事件增量更新，
/// 因此 watch 接收端能看到 Planning / Executing、当前工具调用与计划进度。
#[derive(Debug, Default)]
pub struct EventSink {
    events: Option<UnboundedSender<AgentEvent>>,
    state: Option<watch::Sender<AgentSnapshot>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_state(mut self, tx: watch::Sender<AgentSnapshot>) -> Self {
        self.state = Some(tx);
        self
    }

    pub fn emit(&self, event: AgentEvent) {
        if let Some(state) = &self.state {
            state.send_modify(|snapshot| snapshot.apply(&event));
        }
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// 整体替换快照（没有接收端时同样生效）
    pub fn publish(&self, snapshot: AgentSnapshot) {
        if let Some(state) = &self.state {
            state.send_replace(snapshot);
        }
    }
}
