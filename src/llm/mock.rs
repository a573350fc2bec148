//! 离线模型客户端（无需 API）
//!
//! - MockModelClient：确定性的演示智能体。收到请求后依次 create_plan + web_search、visit_page、
//!   write_code，最后给出文字总结，便于本地跑通整个回合。
//! - ScriptedModelClient：按队列回放预设的回复或错误，并记录发送过的内容，供测试使用。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{
    FunctionCall, FunctionResponse, ModelClient, ModelError, ModelResponse, ModelSession,
    SessionSettings, TurnContent,
};
use crate::memory::DEFAULT_SESSION_NAME;
use crate::tools::{CREATE_PLAN, VISIT_PAGE, WEB_SEARCH, WRITE_CODE};

const TITLE_MAX_WORDS: usize = 5;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// 取前五个词作为标题
fn title_from_prompt(prompt: &str) -> String {
    let title = prompt
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

#[derive(Debug, Default, Clone, Copy)]
pub struct MockModelClient;

#[async_trait]
impl ModelClient for MockModelClient {
    async fn create_session(
        &self,
        settings: SessionSettings,
    ) -> Result<Box<dyn ModelSession>, ModelError> {
        tracing::debug!(model = %settings.model, history = settings.history.len(), "mock session created");
        Ok(Box::new(MockSession::default()))
    }

    async fn generate_title(&self, prompt: &str) -> Result<String, ModelError> {
        Ok(title_from_prompt(prompt))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Stage {
    #[default]
    AwaitingRequest,
    Searched,
    Visited,
    Written,
}

#[derive(Debug, Default)]
struct MockSession {
    stage: Stage,
    request: String,
}

impl MockSession {
    fn first_result_url(results: &[FunctionResponse]) -> Option<String> {
        results
            .iter()
            .find(|r| r.name == WEB_SEARCH)
            .and_then(|r| r.response.result.pointer("/results/0/url"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn script_for(request: &str) -> String {
        format!(
            "notes = {request:?}\n\
             summary = [line.strip() for line in notes.split('.') if line.strip()]\n\
             for item in summary:\n    print('-', item)\n"
        )
    }
}

#[async_trait]
impl ModelSession for MockSession {
    async fn send_turn(&mut self, content: TurnContent) -> Result<ModelResponse, ModelError> {
        match content {
            TurnContent::Text(text) => {
                self.request = text.trim().to_string();
                self.stage = Stage::Searched;
                Ok(ModelResponse::calls(vec![
                    FunctionCall::new(
                        CREATE_PLAN,
                        json!({ "steps": [
                            { "title": "Research", "description": format!("Search the web for {}", self.request) },
                            { "title": "Read source", "description": "Visit the most relevant result" },
                            { "title": "Summarize", "description": "Write and run a summary script" }
                        ]}),
                    ),
                    FunctionCall::new(WEB_SEARCH, json!({ "query": self.request })),
                ])
                .with_text("I'll break this down into a plan and start researching."))
            }
            TurnContent::ToolResults(results) => match self.stage {
                Stage::Searched => {
                    self.stage = Stage::Visited;
                    let url = Self::first_result_url(&results)
                        .unwrap_or_else(|| "https://docs.example.com".to_string());
                    Ok(ModelResponse::calls(vec![FunctionCall::new(
                        VISIT_PAGE,
                        json!({ "url": url }),
                    )]))
                }
                Stage::Visited => {
                    self.stage = Stage::Written;
                    Ok(ModelResponse::calls(vec![FunctionCall::new(
                        WRITE_CODE,
                        json!({
                            "code": Self::script_for(&self.request),
                            "filename": "summary.py"
                        }),
                    )]))
                }
                Stage::Written | Stage::AwaitingRequest => {
                    self.stage = Stage::AwaitingRequest;
                    Ok(ModelResponse::text(format!(
                        "I researched \"{}\", read the top source and wrote summary.py with the key points.",
                        self.request
                    )))
                }
            },
        }
    }
}

/// 预设回复队列；队列耗尽后回复 "Done."
#[derive(Clone, Default)]
pub struct ScriptedModelClient {
    responses: Arc<Mutex<VecDeque<Result<ModelResponse, ModelError>>>>,
    sent: Arc<Mutex<Vec<TurnContent>>>,
    sessions: Arc<Mutex<Vec<SessionSettings>>>,
    title: Arc<Mutex<Option<Result<String, ModelError>>>>,
    latency: Duration,
}

impl ScriptedModelClient {
    pub fn new(responses: Vec<Result<ModelResponse, ModelError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Self::default()
        }
    }

    /// 每次 send_turn 前等待 latency（配合暂停时间测试取消）
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_title(self, title: Result<String, ModelError>) -> Self {
        *lock(&self.title) = Some(title);
        self
    }

    pub fn push(&self, response: Result<ModelResponse, ModelError>) {
        lock(&self.responses).push_back(response);
    }

    /// 与 create_session 返回的会话共享队列
    pub fn session(&self) -> ScriptedSession {
        ScriptedSession {
            client: self.clone(),
        }
    }

    pub fn sent(&self) -> Vec<TurnContent> {
        lock(&self.sent).clone()
    }

    pub fn sessions(&self) -> Vec<SessionSettings> {
        lock(&self.sessions).clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn create_session(
        &self,
        settings: SessionSettings,
    ) -> Result<Box<dyn ModelSession>, ModelError> {
        lock(&self.sessions).push(settings);
        Ok(Box::new(self.session()))
    }

    async fn generate_title(&self, prompt: &str) -> Result<String, ModelError> {
        match lock(&self.title).clone() {
            Some(result) => result,
            None => Ok(title_from_prompt(prompt)),
        }
    }
}

pub struct ScriptedSession {
    client: ScriptedModelClient,
}

#[async_trait]
impl ModelSession for ScriptedSession {
    async fn send_turn(&mut self, content: TurnContent) -> Result<ModelResponse, ModelError> {
        lock(&self.client.sent).push(content);
        if !self.client.latency.is_zero() {
            tokio::time::sleep(self.client.latency).await;
        }
        let next = lock(&self.client.responses).pop_front();
        next.unwrap_or_else(|| Ok(ModelResponse::text("Done.")))
    }
}
