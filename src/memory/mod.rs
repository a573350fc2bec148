//! 记忆层：对话消息、会话与会话列表持久化

pub mod conversation;
pub mod persistence;

pub use conversation::{ChatSession, Message, Role, DEFAULT_SESSION_NAME};
pub use persistence::SessionStore;
