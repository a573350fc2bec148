//! 错误恢复引擎
//!
//! 模型侧错误不重试：归类为 Auth / Transient，并给出一条面向用户的说明，
//! 由 ConversationDriver 作为 agent 消息写入会话后结束回合。

use crate::core::AgentError;
use crate::llm::ModelError;

const AUTH_MESSAGE: &str = "Authentication failed. Please select a valid API Key to continue.";
const TRANSIENT_MESSAGE: &str =
    "I encountered an error while processing your request. Please try again.";

/// 凭据相关错误在消息中出现的标记
const AUTH_MARKERS: [&str; 2] = ["API key", "Requested entity was not found"];

#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 模型错误 -> AgentError::Auth / AgentError::Transient
    pub fn classify(&self, err: &ModelError) -> AgentError {
        let text = err.to_string();
        let is_auth = match err {
            ModelError::MissingCredential | ModelError::Unauthorized { .. } => true,
            _ => AUTH_MARKERS.iter().any(|m| text.contains(m)),
        };
        if is_auth {
            AgentError::Auth(text)
        } else {
            AgentError::Transient(text)
        }
    }

    /// 用户可见的失败说明
    pub fn user_message(&self, err: &AgentError) -> String {
        match err {
            AgentError::Auth(_) => AUTH_MESSAGE.to_string(),
            AgentError::TurnBudgetExceeded { rounds } => format!(
                "Stopped after {rounds} model rounds without a final answer. Please refine the request and try again."
            ),
            _ => TRANSIENT_MESSAGE.to_string(),
        }
    }
}
