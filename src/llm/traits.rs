//! 模型客户端抽象
//!
//! ModelClient 负责创建会话（模型、system prompt、温度、历史、工具声明），
//! ModelSession.send_turn 发送一轮内容（用户文本或一组工具结果），返回文本与函数调用。
//! FunctionCall / FunctionResponse 的 JSON 形状是与模型侧约定的协议，序列化时保持不变。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::memory::Message;

/// 模型请求的一次函数调用：`{"name": ..., "args": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// 后端分配的调用 id（OpenAI tool_call_id）；不属于协议形状
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: None,
            name: name.into(),
            args,
        }
    }
}

/// 工具结果包装：`{"result": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub result: Value,
}

/// 回给模型的一条函数结果：`{"name": ..., "response": {"result": ...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: ResultEnvelope,
}

impl FunctionResponse {
    pub fn new(name: impl Into<String>, result: Value) -> Self {
        Self {
            name: name.into(),
            response: ResultEnvelope { result },
        }
    }
}

/// 一轮发送给模型的内容
#[derive(Debug, Clone, PartialEq)]
pub enum TurnContent {
    Text(String),
    ToolResults(Vec<FunctionResponse>),
}

/// 模型一轮的回复：可选文本 + 零或多个函数调用（按模型给出的顺序）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
        }
    }

    pub fn calls(calls: Vec<FunctionCall>) -> Self {
        Self {
            text: None,
            function_calls: calls,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// 去掉空白文本
    pub fn visible_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// 提供给模型的工具声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 创建会话的参数
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub history: Vec<Message>,
    pub tools: Vec<FunctionDeclaration>,
}

/// 模型客户端错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("API key not found")]
    MissingCredential,

    #[error("Unauthorized ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

/// 模型会话：一次 send_turn 即一轮往返
#[async_trait]
pub trait ModelSession: Send {
    async fn send_turn(&mut self, content: TurnContent) -> Result<ModelResponse, ModelError>;
}

/// 模型客户端：创建会话；为新会话生成标题（不在回合关键路径上）
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn create_session(
        &self,
        settings: SessionSettings,
    ) -> Result<Box<dyn ModelSession>, ModelError>;

    async fn generate_title(&self, prompt: &str) -> Result<String, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_call_shape() {
        let call = FunctionCall::new("web_search", json!({"query": "rust"}));
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({"name": "web_search", "args": {"query": "rust"}})
        );
    }

    #[test]
    fn test_function_response_shape() {
        let resp = FunctionResponse::new("create_plan", json!({"status": "ok"}));
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"name": "create_plan", "response": {"result": {"status": "ok"}}})
        );
    }

    #[test]
    fn test_non_object_args_become_empty() {
        let call = FunctionCall::new("visit_page", json!("not an object"));
        assert!(call.args.is_empty());
    }

    #[test]
    fn test_visible_text_skips_blank() {
        assert_eq!(ModelResponse::text("  ").visible_text(), None);
        assert_eq!(ModelResponse::text(" hi ").visible_text(), Some("hi"));
        assert_eq!(ModelResponse::default().visible_text(), None);
    }
}
