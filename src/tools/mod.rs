//! 工具箱：注册表（描述与校验）、执行引擎（分发与审计）、四个模拟工具与工作区旁路

pub mod create_plan;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod visit_page;
pub mod web_search;
pub mod workspace;
pub mod write_code;

pub const CREATE_PLAN: &str = "create_plan";
pub const WEB_SEARCH: &str = "web_search";
pub const VISIT_PAGE: &str = "visit_page";
pub const WRITE_CODE: &str = "write_code";

pub use executor::{ToolCall, ToolCallStatus, ToolContext, ToolExecutionEngine, ToolOutcome};
pub use registry::{ArgKind, ArgSpec, ToolRegistry, ToolSchema};
pub use web_search::SearchHit;
pub use workspace::{FileArtifact, WebContent, Workspace};
