//! 模型层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use mock::{MockModelClient, ScriptedModelClient, ScriptedSession};
pub use openai::OpenAiModelClient;
pub use traits::{
    FunctionCall, FunctionDeclaration, FunctionResponse, ModelClient, ModelError, ModelResponse,
    ModelSession, ResultEnvelope, SessionSettings, TurnContent,
};

/// 根据配置与环境变量选择模型后端（OpenAI 兼容 / Mock）
pub fn create_model_client(cfg: &AppConfig) -> Arc<dyn ModelClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock model client");
        return Arc::new(MockModelClient);
    }

    let client = OpenAiModelClient::from_config(&cfg.llm);
    if client.has_credential() {
        tracing::info!(model = %cfg.llm.resolved_model(), "Using OpenAI-compatible model client");
        Arc::new(client)
    } else {
        tracing::warn!(
            "No API key in ${} or provider unknown, using Mock model client",
            cfg.llm.api_key_env
        );
        Arc::new(MockModelClient)
    }
}
