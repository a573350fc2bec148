//! OpenAI 兼容 API 客户端
//!
//! 直接用 reqwest 调用 `{base_url}/chat/completions`（可配置 base_url，兼容 OpenAI、DeepSeek、自建代理等）。
//! 工具声明以 `tools[].function` 发送；模型返回的 `tool_calls[].function.arguments` 解析为 JSON 对象；
//! 工具结果按调用顺序以 `role: "tool"` 消息回传，内容为 `{"result": ...}`。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::LlmSection;
use crate::llm::{
    FunctionCall, FunctionDeclaration, FunctionResponse, ModelClient, ModelError, ModelResponse,
    ModelSession, SessionSettings, TurnContent,
};
use crate::memory::{Message, Role};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const TITLE_INSTRUCTION: &str =
    "Generate a very short title (max 5 words) for a chat that starts with the user's message. \
     Reply with the title only.";

#[derive(Debug, Clone)]
struct Endpoint {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Endpoint {
    async fn post_chat(&self, body: &ChatRequest<'_>) -> Result<ChatMessage, ModelError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let completion: ChatCompletion = resp
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ModelError::Decode("response has no choices".to_string()))
    }
}

/// 非 2xx 响应分类：401/403 视为鉴权失败，其余保留状态码
fn classify_status(status: u16, body: String) -> ModelError {
    match status {
        401 | 403 => ModelError::Unauthorized { status, body },
        _ => ModelError::Status { status, body },
    }
}

// OpenAI 兼容消息格式（请求与响应共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool_result(call_id: String, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(call_id),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    tools: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallWire {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: FunctionWire,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionWire {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// OpenAI 兼容客户端：持有 HTTP 客户端、端点与 key
pub struct OpenAiModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    title_model: String,
}

impl OpenAiModelClient {
    pub fn new(base_url: Option<&str>, api_key: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("reqwest client build failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            http,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            title_model: String::new(),
        }
    }

    /// 按 [llm] 配置创建；key 从 api_key_env 指定的环境变量读取
    pub fn from_config(llm: &LlmSection) -> Self {
        let mut client = Self::new(
            llm.base_url.as_deref(),
            std::env::var(&llm.api_key_env).ok(),
            Duration::from_secs(llm.timeouts.request),
        );
        client.title_model = llm.fast_model.clone();
        client
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> Result<Endpoint, ModelError> {
        let api_key = self.api_key.clone().ok_or(ModelError::MissingCredential)?;
        Ok(Endpoint {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiModelClient {
    async fn create_session(
        &self,
        settings: SessionSettings,
    ) -> Result<Box<dyn ModelSession>, ModelError> {
        let endpoint = self.endpoint()?;
        Ok(Box::new(OpenAiSession {
            endpoint,
            messages: history_messages(&settings.system_instruction, &settings.history),
            tools: tool_specs(&settings.tools),
            model: settings.model,
            temperature: settings.temperature,
            pending_call_ids: Vec::new(),
        }))
    }

    async fn generate_title(&self, prompt: &str) -> Result<String, ModelError> {
        let endpoint = self.endpoint()?;
        let messages = [
            ChatMessage::text("system", TITLE_INSTRUCTION),
            ChatMessage::text("user", prompt),
        ];
        let message = endpoint
            .post_chat(&ChatRequest {
                model: &self.title_model,
                messages: &messages,
                temperature: None,
                tools: &[],
            })
            .await?;
        Ok(message.content.unwrap_or_default().trim().to_string())
    }
}

struct OpenAiSession {
    endpoint: Endpoint,
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
    tools: Vec<Value>,
    /// 上一轮 assistant 消息中的 tool_call id，按顺序与工具结果配对
    pending_call_ids: Vec<String>,
}

#[async_trait]
impl ModelSession for OpenAiSession {
    async fn send_turn(&mut self, content: TurnContent) -> Result<ModelResponse, ModelError> {
        match content {
            TurnContent::Text(text) => {
                self.messages.push(ChatMessage::text("user", text));
            }
            TurnContent::ToolResults(results) => {
                let ids = std::mem::take(&mut self.pending_call_ids);
                self.messages.extend(tool_result_messages(&ids, &results));
            }
        }

        let request = ChatRequest {
            model: &self.model,
            messages: &self.messages,
            temperature: Some(self.temperature),
            tools: &self.tools,
        };
        let message = self.endpoint.post_chat(&request).await?;
        let (response, ids) = parse_message(&message);
        self.pending_call_ids = ids;
        self.messages.push(message);
        Ok(response)
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Agent => "assistant",
        Role::System => "system",
    }
}

fn history_messages(system_instruction: &str, history: &[Message]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !system_instruction.is_empty() {
        messages.push(ChatMessage::text("system", system_instruction));
    }
    messages.extend(
        history
            .iter()
            .map(|m| ChatMessage::text(role_name(m.role), m.content.clone())),
    );
    messages
}

fn tool_specs(tools: &[FunctionDeclaration]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| json!({ "type": "function", "function": t }))
        .collect()
}

fn tool_result_messages(ids: &[String], results: &[FunctionResponse]) -> Vec<ChatMessage> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let id = ids.get(i).cloned().unwrap_or_else(|| format!("call_{i}"));
            ChatMessage::tool_result(id, serde_json::to_string(&r.response).unwrap_or_default())
        })
        .collect()
}

/// assistant 消息 -> ModelResponse + tool_call id 列表
fn parse_message(message: &ChatMessage) -> (ModelResponse, Vec<String>) {
    let text = message.content.clone();
    let wire = message.tool_calls.as_deref().unwrap_or_default();

    let mut ids = Vec::with_capacity(wire.len());
    let mut function_calls = Vec::with_capacity(wire.len());
    for call in wire {
        let args = if call.function.arguments.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(Value::Object(map)) => map,
                _ => {
                    // 参数无法解析时交给工具校验，作为参数错误回给模型
                    tracing::warn!(tool = %call.function.name, "tool call arguments are not a JSON object");
                    Map::new()
                }
            }
        };
        ids.push(call.id.clone());
        function_calls.push(FunctionCall {
            id: Some(call.id.clone()),
            name: call.function.name.clone(),
            args,
        });
    }

    (
        ModelResponse {
            text,
            function_calls,
        },
        ids,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_maps_roles() {
        let history = vec![Message::user("hi"), Message::agent("hello")];
        let msgs = history_messages("be brief", &history);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[2].role, "assistant");
        assert_eq!(msgs[2].content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_parse_message_with_tool_calls() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_a", "type": "function",
                 "function": {"name": "web_search", "arguments": "{\"query\":\"rust\"}"}},
                {"id": "call_b", "type": "function",
                 "function": {"name": "visit_page", "arguments": "not json"}}
            ]
        }))
        .unwrap();
        let (resp, ids) = parse_message(&message);
        assert_eq!(ids, vec!["call_a", "call_b"]);
        assert!(resp.text.is_none());
        assert_eq!(resp.function_calls[0].name, "web_search");
        assert_eq!(resp.function_calls[0].args["query"], "rust");
        assert!(resp.function_calls[1].args.is_empty());

        // 回放到历史时保留 tool_calls 原样
        let echoed = serde_json::to_value(&message).unwrap();
        assert_eq!(echoed["tool_calls"][0]["type"], "function");
        assert_eq!(echoed["tool_calls"][1]["function"]["arguments"], "not json");
        assert!(echoed.get("tool_call_id").is_none());
    }

    #[test]
    fn test_text_only_reply_has_no_calls() {
        let message: ChatMessage =
            serde_json::from_value(json!({"role": "assistant", "content": "4"})).unwrap();
        let (resp, ids) = parse_message(&message);
        assert_eq!(resp.text.as_deref(), Some("4"));
        assert!(resp.function_calls.is_empty());
        assert!(ids.is_empty());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(401, String::new()),
            ModelError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            classify_status(403, String::new()),
            ModelError::Unauthorized { status: 403, .. }
        ));
        assert!(matches!(
            classify_status(429, "slow down".into()),
            ModelError::Status { status: 429, body } if body == "slow down"
        ));
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let messages = [ChatMessage::text("user", "hi")];
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: None,
            tools: &[],
        })
        .unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_tool_results_pair_with_call_ids_in_order() {
        let results = vec![
            FunctionResponse::new("web_search", json!({"results": []})),
            FunctionResponse::new("visit_page", json!({"content": "x"})),
        ];
        let msgs = tool_result_messages(&["call_a".to_string()], &results);
        assert_eq!(msgs[0].role, "tool");
        assert_eq!(msgs[0].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(msgs[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msgs[0].content.as_deref(), Some(r#"{"result":{"results":[]}}"#));
    }

    #[tokio::test]
    async fn test_missing_key_is_missing_credential() {
        let client = OpenAiModelClient::new(None, None, Duration::from_secs(1));
        assert!(!client.has_credential());
        let err = client.generate_title("hello").await.unwrap_err();
        assert_eq!(err, ModelError::MissingCredential);
    }
}
