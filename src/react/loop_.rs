//! 回合主循环（ConversationDriver）
//!
//! 用户输入 -> 模型 -> {文本, 函数调用} -> ToolExecutionEngine（修改 PlanTracker）-> 工具结果回给模型 -> ...
//! 直到模型不再请求工具、达到轮数上限、出错或被取消；无论哪种结局，回合结束时阶段都回到 Idle。
//! 会话与模型会话通过 TurnContext 显式传入，驱动器本身不持有「当前会话」。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, DelaySection};
use crate::core::{AgentError, AgentPhase, AgentSnapshot, RecoveryEngine, Scheduler};
use crate::llm::{
    FunctionCall, FunctionDeclaration, FunctionResponse, ModelResponse, ModelSession, TurnContent,
};
use crate::memory::{ChatSession, Message};
use crate::plan::{ActionStatus, PlanTracker};
use crate::react::{AgentEvent, EventSink};
use crate::tools::{ToolCall, ToolCallStatus, ToolContext, ToolExecutionEngine, Workspace};

/// 默认单回合最多与模型往返的次数
pub const DEFAULT_MAX_ROUNDS: usize = 16;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub max_rounds: usize,
    pub delays: DelaySection,
}

impl DriverConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            max_rounds: cfg.agent.max_rounds.max(1),
            delays: cfg.agent.delays.clone(),
        }
    }

    /// 零延迟（测试 / 脚本化运行）
    pub fn immediate(max_rounds: usize) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            delays: DelaySection::zero(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            delays: DelaySection::default(),
        }
    }
}

/// 单次 submit 的显式上下文
pub struct TurnContext<'a> {
    pub session: &'a mut ChatSession,
    pub model: &'a mut dyn ModelSession,
    pub cancel: CancellationToken,
}

/// 回合结局
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// 模型给出最终文本；rounds 为模型往返次数
    Completed { rounds: usize },
    /// 空输入，未发生任何状态变化
    Rejected,
    /// 模型侧错误（Auth / Transient），已写入一条说明消息
    Failed(AgentError),
    TurnBudgetExceeded { rounds: usize },
    Cancelled,
}

pub struct ConversationDriver {
    config: DriverConfig,
    engine: ToolExecutionEngine,
    recovery: RecoveryEngine,
    plan: PlanTracker,
    workspace: Workspace,
    phase: AgentPhase,
    active_call: Option<ToolCall>,
    sink: Arc<EventSink>,
}

impl ConversationDriver {
    pub fn new(config: DriverConfig, engine: ToolExecutionEngine) -> Self {
        Self {
            config,
            engine,
            recovery: RecoveryEngine::new(),
            plan: PlanTracker::new(),
            workspace: Workspace::new(),
            phase: AgentPhase::Idle,
            active_call: None,
            sink: Arc::new(EventSink::new()),
        }
    }

    pub fn with_event_tx(self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.with_sink(Arc::new(EventSink::new().with_events(tx)))
    }

    /// 与宿主共享的事件出口（事件通道 + 快照）
    pub fn with_sink(mut self, sink: Arc<EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn plan(&self) -> &PlanTracker {
        &self.plan
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// 打开模型会话时提供的工具声明
    pub fn tool_declarations(&self) -> Vec<FunctionDeclaration> {
        self.engine.registry().declarations()
    }

    /// 切换会话：清空计划与工作区，返回用于新模型会话的历史
    pub fn resume(&mut self, session: &ChatSession) -> Vec<Message> {
        self.plan.reset();
        self.workspace.reset();
        self.active_call = None;
        self.set_phase(AgentPhase::Idle);
        self.emit(AgentEvent::PlanUpdated { steps: Vec::new() });
        tracing::info!(session_id = %session.id, messages = session.messages.len(), "session resumed");
        session.messages.clone()
    }

    pub fn snapshot(&self, session: &ChatSession) -> AgentSnapshot {
        AgentSnapshot {
            phase: self.phase,
            session_id: Some(session.id.clone()),
            session_name: Some(session.name.clone()),
            messages: session.messages.clone(),
            plan: self.plan.snapshot(),
            active_tool_call: self.active_call.clone(),
            files: self.workspace.files().to_vec(),
            last_web_content: self.workspace.last_web_content().cloned(),
            viewer_open: self.workspace.is_viewer_open(),
            sessions: Vec::new(),
        }
    }

    /// 处理一次用户提交，直到回合结束
    pub async fn submit(&mut self, ctx: TurnContext<'_>, text: &str) -> TurnOutcome {
        if text.trim().is_empty() {
            tracing::debug!("empty submission rejected");
            return TurnOutcome::Rejected;
        }
        let TurnContext {
            session,
            model,
            cancel,
        } = ctx;

        tracing::info!(session_id = %session.id, "turn started");
        self.append_message(session, Message::user(text));
        self.set_phase(AgentPhase::Planning);

        let scheduler = Scheduler::new(self.config.delays.clone(), cancel);
        let result = self
            .run_rounds(session, model, &scheduler, TurnContent::Text(text.to_string()))
            .await;

        let outcome = match result {
            Ok(rounds) => TurnOutcome::Completed { rounds },
            Err(AgentError::Cancelled) => {
                let settled = self.plan.settle_active_running(ActionStatus::Failed);
                if settled > 0 {
                    self.emit(AgentEvent::PlanUpdated {
                        steps: self.plan.snapshot(),
                    });
                }
                tracing::info!(settled, "turn cancelled");
                TurnOutcome::Cancelled
            }
            Err(AgentError::TurnBudgetExceeded { rounds }) => {
                tracing::warn!(rounds, "turn budget exceeded");
                let err = AgentError::TurnBudgetExceeded { rounds };
                self.append_message(session, Message::agent(self.recovery.user_message(&err)));
                TurnOutcome::TurnBudgetExceeded { rounds }
            }
            Err(err) => {
                self.append_message(session, Message::agent(self.recovery.user_message(&err)));
                TurnOutcome::Failed(err)
            }
        };

        self.active_call = None;
        self.set_phase(AgentPhase::Idle);
        tracing::info!(session_id = %session.id, ?outcome, "turn finished");
        outcome
    }

    async fn run_rounds(
        &mut self,
        session: &mut ChatSession,
        model: &mut dyn ModelSession,
        scheduler: &Scheduler,
        first: TurnContent,
    ) -> Result<usize, AgentError> {
        let mut content = first;
        let mut rounds = 0;
        loop {
            rounds += 1;
            self.emit(AgentEvent::RoundStarted {
                round: rounds,
                max_rounds: self.config.max_rounds,
            });
            let response = self.send(model, scheduler.token(), content).await?;

            // 文本先于工具结果可见
            if let Some(text) = response.visible_text() {
                self.append_message(session, Message::agent(text));
            }
            if response.function_calls.is_empty() {
                return Ok(rounds);
            }
            if rounds >= self.config.max_rounds {
                return Err(AgentError::TurnBudgetExceeded { rounds });
            }

            self.set_phase(AgentPhase::Executing);
            let mut results = Vec::with_capacity(response.function_calls.len());
            for call in response.function_calls {
                results.push(self.run_call(call, scheduler).await?);
            }
            content = TurnContent::ToolResults(results);
        }
    }

    /// 与模型往返一次；与取消令牌竞争
    async fn send(
        &self,
        model: &mut dyn ModelSession,
        cancel: &CancellationToken,
        content: TurnContent,
    ) -> Result<ModelResponse, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            res = model.send_turn(content) => res.map_err(|e| {
                let err = self.recovery.classify(&e);
                tracing::warn!(error = %e, kind = err.kind(), "model request failed");
                err
            }),
        }
    }

    async fn run_call(
        &mut self,
        call: FunctionCall,
        scheduler: &Scheduler,
    ) -> Result<FunctionResponse, AgentError> {
        if scheduler.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let mut tool_call = ToolCall::running(&call.name, call.args.clone());
        self.active_call = Some(tool_call.clone());
        self.emit(AgentEvent::ToolCallStarted {
            call: tool_call.clone(),
        });

        let mut ctx = ToolContext {
            plan: &mut self.plan,
            workspace: &mut self.workspace,
            scheduler,
            events: Some(self.sink.as_ref()),
        };
        let result = self.engine.execute(&call.name, &call.args, &mut ctx).await;

        let response = match result {
            Ok(outcome) => {
                tool_call.status = outcome.status;
                tool_call.result = Some(outcome.payload.clone());
                Ok(FunctionResponse::new(call.name, outcome.payload))
            }
            Err(e) => {
                tool_call.status = ToolCallStatus::Failed;
                Err(e)
            }
        };
        self.active_call = None;
        self.emit(AgentEvent::ToolCallFinished { call: tool_call });
        response
    }

    fn append_message(&self, session: &mut ChatSession, message: Message) {
        session.push(message.clone());
        self.emit(AgentEvent::MessageAppended { message });
    }

    fn set_phase(&mut self, phase: AgentPhase) {
        if self.phase != phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "phase changed");
            self.phase = phase;
            self.emit(AgentEvent::PhaseChanged { phase });
        }
    }

    fn emit(&self, event: AgentEvent) {
        self.sink.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModelClient;
    use serde_json::json;

    fn driver() -> ConversationDriver {
        ConversationDriver::new(DriverConfig::immediate(4), ToolExecutionEngine::default())
    }

    #[tokio::test]
    async fn test_whitespace_submission_is_rejected() {
        let mut driver = driver();
        let client = ScriptedModelClient::new(vec![]);
        let mut model = client.session();
        let mut session = ChatSession::new();
        let outcome = driver
            .submit(
                TurnContext {
                    session: &mut session,
                    model: &mut model,
                    cancel: CancellationToken::new(),
                },
                "   \n",
            )
            .await;
        assert_eq!(outcome, TurnOutcome::Rejected);
        assert!(session.is_empty());
        assert!(client.sent().is_empty());
        assert_eq!(driver.phase(), AgentPhase::Idle);
    }

    #[tokio::test]
    async fn test_tool_results_are_sent_as_one_turn() {
        let mut driver = driver();
        let client = ScriptedModelClient::new(vec![
            Ok(ModelResponse::calls(vec![
                FunctionCall::new("web_search", json!({"query": "tokio"})),
                FunctionCall::new("teleport", json!({})),
            ])),
            Ok(ModelResponse::text("Here is what I found.")),
        ]);
        let mut model = client.session();
        let mut session = ChatSession::new();
        let outcome = driver
            .submit(
                TurnContext {
                    session: &mut session,
                    model: &mut model,
                    cancel: CancellationToken::new(),
                },
                "search tokio",
            )
            .await;
        assert_eq!(outcome, TurnOutcome::Completed { rounds: 2 });

        let sent = client.sent();
        assert_eq!(sent.len(), 2);
        let TurnContent::ToolResults(results) = &sent[1] else {
            panic!("expected tool results");
        };
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "web_search");
        assert_eq!(results[1].name, "teleport");
        assert_eq!(results[1].response.result, json!({"error": "Unknown tool"}));
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_resume_resets_plan_and_workspace() {
        let mut driver = driver();
        let client = ScriptedModelClient::new(vec![
            Ok(ModelResponse::calls(vec![
                FunctionCall::new("create_plan", json!({"steps": [{"title": "A", "description": ""}]})),
                FunctionCall::new("write_code", json!({"code": "print(1)", "filename": "a.py"})),
            ])),
            Ok(ModelResponse::text("Done.")),
        ]);
        let mut model = client.session();
        let mut session = ChatSession::new();
        driver
            .submit(
                TurnContext {
                    session: &mut session,
                    model: &mut model,
                    cancel: CancellationToken::new(),
                },
                "write a script",
            )
            .await;
        assert_eq!(driver.plan().len(), 1);
        assert_eq!(driver.workspace().files().len(), 1);

        let other = ChatSession::new();
        let history = driver.resume(&other);
        assert!(history.is_empty());
        assert!(driver.plan().is_empty());
        assert!(driver.workspace().files().is_empty());
        assert!(!driver.snapshot(&other).viewer_open);
    }
}
