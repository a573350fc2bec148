//! 核心编排层：错误与恢复、状态投影、会话监管、可取消调度、主控循环

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod scheduler;
pub mod session_supervisor;
pub mod state;

pub use error::AgentError;
pub use orchestrator::{create_agent, Command, SettingsUpdate};
pub use recovery::RecoveryEngine;
pub use scheduler::Scheduler;
pub use session_supervisor::SessionSupervisor;
pub use state::{AgentPhase, AgentSnapshot, SessionSummary};
