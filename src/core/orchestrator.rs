//! Agent 编排器：主控循环
//!
//! 持有当前会话、模型会话、会话列表与 ConversationDriver，建立 cmd / state / event 三通道，
//! 在后台任务中消费用户命令（Submit / Cancel / NewTask / LoadSession / ... / Quit）。
//! 回合进行中仍然接收命令：Cancel 立即取消，新的 Submit 被拒绝，切换会话类命令先取消当前回合再执行。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{AppConfig, ModelMode};
use crate::core::{AgentError, AgentPhase, AgentSnapshot, SessionSummary, SessionSupervisor};
use crate::llm::{ModelClient, ModelError, ModelResponse, ModelSession, SessionSettings, TurnContent};
use crate::memory::{ChatSession, SessionStore, DEFAULT_SESSION_NAME};
use crate::react::{
    AgentEvent, ConversationDriver, DriverConfig, EventSink, TurnContext, TurnOutcome,
};
use crate::tools::ToolExecutionEngine;

const TITLE_MAX_WORDS: usize = 5;

/// 从展示层发往编排器的用户命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交用户输入，触发一个回合
    Submit(String),
    /// 取消当前回合
    Cancel,
    /// 新建空白会话
    NewTask,
    LoadSession(String),
    RenameSession { id: String, name: String },
    ToggleFavorite(String),
    DeleteSession(String),
    /// 更新模型设置；下一回合前以当前历史重新打开模型会话
    UpdateSettings(SettingsUpdate),
    /// 退出
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    pub model_mode: Option<ModelMode>,
}

/// 模型会话无法打开时的占位：每次发送都返回打开失败的原因，交由回合按普通模型错误处理
struct UnavailableSession(ModelError);

#[async_trait]
impl ModelSession for UnavailableSession {
    async fn send_turn(&mut self, _content: TurnContent) -> Result<ModelResponse, ModelError> {
        Err(self.0.clone())
    }
}

/// 标题：去掉引号与首尾空白，最多五个词；为空时回退为默认名
fn normalize_title(raw: &str) -> String {
    let title = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .split_whitespace()
        .take(TITLE_MAX_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        DEFAULT_SESSION_NAME.to_string()
    } else {
        title
    }
}

struct Runtime {
    cfg: AppConfig,
    client: Arc<dyn ModelClient>,
    store: SessionStore,
    driver: ConversationDriver,
    session: ChatSession,
    model: Option<Box<dyn ModelSession>>,
    supervisor: SessionSupervisor,
    /// 鉴权失败后等待用户处理凭据，直到下一个成功回合
    waiting_on_user: bool,
    /// 与驱动器共享：事件通道 + watch 快照
    sink: Arc<EventSink>,
    title_tx: mpsc::UnboundedSender<(String, String)>,
}

impl Runtime {
    fn publish(&self) {
        let mut snapshot = self.driver.snapshot(&self.session);
        if self.waiting_on_user && snapshot.phase == AgentPhase::Idle {
            snapshot.phase = AgentPhase::WaitingOnUser;
        }
        snapshot.sessions = self.store.list().into_iter().map(SessionSummary::from).collect();
        self.sink.publish(snapshot);
    }

    fn emit(&self, event: AgentEvent) {
        self.sink.emit(event);
    }

    fn persist(&mut self) {
        if self.session.is_empty() {
            return;
        }
        self.store.upsert(&self.session);
        if let Err(e) = self.store.save() {
            tracing::warn!("Failed to save sessions: {:#}", e);
        }
    }

    fn settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.cfg.llm.resolved_model(),
            system_instruction: self.cfg.llm.system_instruction().to_string(),
            temperature: self.cfg.llm.temperature,
            history: self.session.messages.clone(),
            tools: self.driver.tool_declarations(),
        }
    }

    /// 取出（或按当前历史新建）模型会话
    async fn take_model(&mut self) -> Box<dyn ModelSession> {
        if let Some(model) = self.model.take() {
            return model;
        }
        match self.client.create_session(self.settings()).await {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!("Failed to open model session: {}", e);
                Box::new(UnavailableSession(e))
            }
        }
    }

    fn spawn_title(&self, prompt: String) {
        let client = self.client.clone();
        let tx = self.title_tx.clone();
        let session_id = self.session.id.clone();
        tokio::spawn(async move {
            let name = match client.generate_title(&prompt).await {
                Ok(raw) => normalize_title(&raw),
                Err(e) => {
                    tracing::warn!("Title generation failed: {}", e);
                    DEFAULT_SESSION_NAME.to_string()
                }
            };
            let _ = tx.send((session_id, name));
        });
    }

    /// 把标题写入当前会话与会话列表
    fn store_title(&mut self, session_id: &str, name: &str) {
        if self.session.id == session_id {
            self.session.name = name.to_string();
        }
        if self.store.rename(session_id, name.to_string()) {
            self.save_store();
        }
    }

    fn apply_title(&mut self, session_id: String, name: String) {
        self.store_title(&session_id, &name);
        self.emit(AgentEvent::SessionTitled { session_id, name });
        self.publish();
    }

    /// 执行一个回合；期间收到的其它命令返回给调用方在回合结束后处理
    async fn run_turn(
        &mut self,
        text: String,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
        title_rx: &mut mpsc::UnboundedReceiver<(String, String)>,
    ) -> Vec<Command> {
        let mut deferred = Vec::new();
        let mut titles = Vec::new();
        // 标题生成与回合并行
        if self.session.is_empty()
            && self.session.name == DEFAULT_SESSION_NAME
            && !text.trim().is_empty()
        {
            self.spawn_title(text.clone());
        }
        let cancel = self.supervisor.begin_turn();
        let mut model = self.take_model().await;
        self.publish();

        let outcome = {
            let turn = self.driver.submit(
                TurnContext {
                    session: &mut self.session,
                    model: &mut *model,
                    cancel,
                },
                &text,
            );
            tokio::pin!(turn);
            loop {
                tokio::select! {
                    outcome = &mut turn => break outcome,
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        Command::Submit(rejected) => {
                            tracing::info!("Turn in flight, submission rejected");
                            self.sink.emit(AgentEvent::SubmissionRejected { text: rejected });
                        }
                        Command::Cancel => {
                            self.supervisor.cancel();
                        }
                        cmd @ (Command::NewTask
                        | Command::LoadSession(_)
                        | Command::DeleteSession(_)
                        | Command::Quit) => {
                            self.supervisor.cancel();
                            deferred.push(cmd);
                        }
                        other => deferred.push(other),
                    },
                    // 回合中先更新快照与事件，会话本身在回合结束后改名
                    Some((session_id, name)) = title_rx.recv() => {
                        self.sink.emit(AgentEvent::SessionTitled {
                            session_id: session_id.clone(),
                            name: name.clone(),
                        });
                        titles.push((session_id, name));
                    }
                }
            }
        };
        self.supervisor.end_turn();

        match &outcome {
            TurnOutcome::Rejected => {
                self.emit(AgentEvent::SubmissionRejected { text });
                self.model = Some(model);
                self.publish();
                return deferred;
            }
            TurnOutcome::Completed { .. } => {
                self.waiting_on_user = false;
                self.model = Some(model);
            }
            // 其余结局下模型会话可能停在未回复的工具调用上：丢弃，下一回合按会话历史重新打开
            TurnOutcome::Failed(AgentError::Auth(_)) => self.waiting_on_user = true,
            _ => {}
        }

        self.persist();
        for (session_id, name) in titles {
            self.store_title(&session_id, &name);
        }
        self.publish();
        deferred
    }

    fn start_new_task(&mut self) {
        self.persist();
        self.session = ChatSession::new();
        self.driver.resume(&self.session);
        self.model = None;
        self.waiting_on_user = false;
    }

    /// 空闲时处理命令；返回 false 表示退出
    fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Submit(text) => {
                tracing::warn!("Submit reached the idle handler, dropped");
                self.emit(AgentEvent::SubmissionRejected { text });
            }
            Command::Cancel => {
                self.supervisor.cancel();
            }
            Command::NewTask => self.start_new_task(),
            Command::LoadSession(id) => match self.store.get(&id).cloned() {
                Some(session) => {
                    self.persist();
                    self.session = session;
                    self.driver.resume(&self.session);
                    self.model = None;
                    self.waiting_on_user = false;
                }
                None => tracing::warn!(session_id = %id, "No such session"),
            },
            Command::RenameSession { id, name } => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return true;
                }
                if self.session.id == id {
                    self.session.name = name.clone();
                }
                if self.store.rename(&id, name) {
                    self.save_store();
                }
            }
            Command::ToggleFavorite(id) => {
                if let Some(is_favorite) = self.store.toggle_favorite(&id) {
                    if self.session.id == id {
                        self.session.is_favorite = is_favorite;
                    }
                    self.save_store();
                }
            }
            Command::DeleteSession(id) => {
                if self.store.delete(&id) {
                    self.save_store();
                }
                if self.session.id == id {
                    self.session = ChatSession::new();
                    self.driver.resume(&self.session);
                    self.model = None;
                }
            }
            Command::UpdateSettings(update) => {
                if let Some(t) = update.temperature {
                    self.cfg.llm.temperature = t;
                }
                if let Some(s) = update.system_instruction {
                    self.cfg.llm.system_instruction = Some(s);
                }
                if let Some(mode) = update.model_mode {
                    self.cfg.llm.model_mode = mode;
                }
                self.model = None;
                tracing::info!(model = %self.cfg.llm.resolved_model(), "Settings updated");
            }
            Command::Quit => {
                self.supervisor.cancel();
                self.persist();
                return false;
            }
        }
        self.publish();
        true
    }

    fn save_store(&self) {
        if let Err(e) = self.store.save() {
            tracing::warn!("Failed to save sessions: {:#}", e);
        }
    }
}

/// 创建 Agent 运行时：返回命令发送端、快照接收端、事件接收端与后台任务句柄。
///
/// 发送 Quit 后等待句柄结束，可保证当前会话已落盘。
pub fn create_agent(
    cfg: AppConfig,
    client: Arc<dyn ModelClient>,
    store: SessionStore,
) -> (
    mpsc::UnboundedSender<Command>,
    watch::Receiver<AgentSnapshot>,
    mpsc::UnboundedReceiver<AgentEvent>,
    JoinHandle<()>,
) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let (title_tx, mut title_rx) = mpsc::unbounded_channel::<(String, String)>();

    let driver = ConversationDriver::new(DriverConfig::from_app(&cfg), ToolExecutionEngine::default());
    let session = ChatSession::new();
    let (state_tx, state_rx) = watch::channel(driver.snapshot(&session));
    let sink = Arc::new(EventSink::new().with_events(event_tx).with_state(state_tx));
    let driver = driver.with_sink(sink.clone());

    let mut runtime = Runtime {
        cfg,
        client,
        store,
        driver,
        session,
        model: None,
        supervisor: SessionSupervisor::new(),
        waiting_on_user: false,
        sink,
        title_tx,
    };
    runtime.publish();

    let task = tokio::spawn(async move {
        'main: loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break 'main };
                    let pending = match cmd {
                        Command::Submit(text) => {
                            runtime.run_turn(text, &mut cmd_rx, &mut title_rx).await
                        }
                        other => vec![other],
                    };
                    for cmd in pending {
                        if !runtime.handle(cmd) {
                            break 'main;
                        }
                    }
                }
                Some((session_id, name)) = title_rx.recv() => {
                    runtime.apply_title(session_id, name);
                }
            }
        }
        runtime.persist();
        tracing::info!("Agent loop stopped");
    });

    (cmd_tx, state_rx, event_rx, task)
}
