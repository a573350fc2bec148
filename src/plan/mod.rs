//! 计划层：步骤 / 动作类型与 PlanTracker 状态机

pub mod tracker;
pub mod types;

pub use tracker::{AppendResult, CompleteResult, PlanCursor, PlanTracker};
pub use types::{
    ActionDraft, ActionKind, ActionStatus, PlanAction, PlanStep, StepDraft, StepStatus,
};
