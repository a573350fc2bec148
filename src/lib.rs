//! Nexa - 智能体回合执行核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、状态快照、会话监管、可取消调度、主控循环
//! - **llm**: 模型客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）
//! - **memory**: 对话消息、会话与会话列表持久化
//! - **observability**: tracing 初始化
//! - **plan**: 计划步骤与动作日志（PlanTracker）
//! - **react**: ConversationDriver 回合主循环与过程事件
//! - **tools**: 工具注册表、执行引擎与四个模拟工具
//! - **ui**: 行式控制台

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod plan;
pub mod react;
pub mod tools;
pub mod ui;
