//! 回合执行层：ConversationDriver 主循环与过程事件

pub mod events;
pub mod loop_;

pub use events::{AgentEvent, EventSink};
pub use loop_::{ConversationDriver, DriverConfig, TurnContext, TurnOutcome, DEFAULT_MAX_ROUNDS};
