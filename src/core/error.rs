//! Agent 错误类型
//!
//! 工具内的错误（InvalidPlan / ToolArgument / UnknownTool）在引擎里转成结果载荷回给模型；
//! 模型侧错误（Auth / Transient）结束当前回合并生成一条用户可见消息。

use thiserror::Error;

/// 回合执行过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// create_plan 参数非法（空列表或缺少 title）
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// 没有 active / pending 的步骤可以承接变更（非致命）
    #[error("No eligible plan step")]
    NoEligibleStep,

    #[error("Invalid arguments for {tool}: {message}")]
    ToolArgument { tool: String, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 缺少或无效的凭据
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 其余模型调用失败
    #[error("Model request failed: {0}")]
    Transient(String),

    #[error("Turn budget exceeded after {rounds} rounds")]
    TurnBudgetExceeded { rounds: usize },

    #[error("Cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 写入工具结果载荷的错误分类名
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::InvalidPlan(_) => "InvalidPlan",
            AgentError::NoEligibleStep => "NoEligibleStep",
            AgentError::ToolArgument { .. } => "ToolArgumentError",
            AgentError::UnknownTool(_) => "UnknownTool",
            AgentError::Auth(_) => "AuthError",
            AgentError::Transient(_) => "TransientError",
            AgentError::TurnBudgetExceeded { .. } => "TurnBudgetExceeded",
            AgentError::Cancelled => "Cancelled",
            AgentError::Config(_) => "ConfigError",
        }
    }
}
