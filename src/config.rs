//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NEXA__*` 覆盖（双下划线表示嵌套，如 `NEXA__AGENT__MAX_ROUNDS=8`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 默认 system prompt：规划 -> 执行工具 -> 核对 -> 汇报
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"You are "Nexa", a general autonomous agent.
Solve the user's request by planning, calling tools, and checking their results.

1. Read the goal. Ask for clarification if it is vague.
2. Simple questions: answer directly or call web_search once. Do not create a plan.
3. Multi-step work (browsing plus coding, or a specific workflow): call create_plan FIRST.
4. Execute the plan with web_search, visit_page and write_code.
5. Check every tool result. If a tool fails, retry or adjust the plan.
6. Finish with a concise answer based on the tool outputs.

When you write code, also show the full code in a Markdown code block in your reply;
the user cannot see tool arguments."#;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agent: AgentSection,
}

/// [app] 段：应用名、会话列表文件
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 会话列表 JSON 文件，未设置时用 ./workspace/sessions.json
    #[serde(default = "default_sessions_path")]
    pub sessions_path: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            sessions_path: default_sessions_path(),
        }
    }
}

fn default_sessions_path() -> PathBuf {
    PathBuf::from("workspace/sessions.json")
}

/// 模型档位：fast / max，映射到具体模型 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    #[default]
    Fast,
    Max,
}

/// [llm] 段：后端选择、模型、温度、system prompt
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 显式模型 id；未设置时按 model_mode 映射
    pub model: Option<String>,
    #[serde(default)]
    pub model_mode: ModelMode,
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    #[serde(default = "default_max_model")]
    pub max_model: String,
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            model_mode: ModelMode::default(),
            fast_model: default_fast_model(),
            max_model: default_max_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            system_instruction: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    /// 实际使用的模型：显式 model 优先，否则按档位映射
    pub fn resolved_model(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.model_mode {
            ModelMode::Fast => self.fast_model.clone(),
            ModelMode::Max => self.max_model.clone(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        self.system_instruction
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_fast_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [agent] 段：单回合模型轮数上限与工具模拟延迟
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 单回合内与模型往返的最大轮数
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default)]
    pub delays: DelaySection,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            delays: DelaySection::default(),
        }
    }
}

fn default_max_rounds() -> usize {
    16
}

/// [agent.delays] 段：各工具模拟耗时（毫秒）
#[derive(Debug, Clone, Deserialize)]
pub struct DelaySection {
    #[serde(default = "default_search_ms")]
    pub search_ms: u64,
    #[serde(default = "default_search_settle_ms")]
    pub search_settle_ms: u64,
    #[serde(default = "default_visit_ms")]
    pub visit_ms: u64,
    #[serde(default = "default_write_ms")]
    pub write_ms: u64,
    #[serde(default = "default_write_settle_ms")]
    pub write_settle_ms: u64,
    #[serde(default = "default_execute_ms")]
    pub execute_ms: u64,
}

impl Default for DelaySection {
    fn default() -> Self {
        Self {
            search_ms: default_search_ms(),
            search_settle_ms: default_search_settle_ms(),
            visit_ms: default_visit_ms(),
            write_ms: default_write_ms(),
            write_settle_ms: default_write_settle_ms(),
            execute_ms: default_execute_ms(),
        }
    }
}

impl DelaySection {
    /// 全部为 0（测试与离线演示用）
    pub fn zero() -> Self {
        Self {
            search_ms: 0,
            search_settle_ms: 0,
            visit_ms: 0,
            write_ms: 0,
            write_settle_ms: 0,
            execute_ms: 0,
        }
    }

    pub fn search(&self) -> Duration {
        Duration::from_millis(self.search_ms)
    }

    pub fn search_settle(&self) -> Duration {
        Duration::from_millis(self.search_settle_ms)
    }

    pub fn visit(&self) -> Duration {
        Duration::from_millis(self.visit_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    pub fn execute(&self) -> Duration {
        Duration::from_millis(self.execute_ms)
    }
}

fn default_search_ms() -> u64 {
    800
}

fn default_search_settle_ms() -> u64 {
    500
}

fn default_visit_ms() -> u64 {
    1000
}

fn default_write_ms() -> u64 {
    800
}

fn default_write_settle_ms() -> u64 {
    800
}

fn default_execute_ms() -> u64 {
    1500
}

/// 从 config 目录加载配置，环境变量 NEXA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NEXA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NEXA")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AgentError::Config(e.to_string()))
}
