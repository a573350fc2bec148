//! PlanTracker：计划步骤状态机
//!
//! 步骤按列表顺序推进：首个 pending 步骤在第一次追加动作时被提升为 active，
//! 完成（或失败）后游标移到下一个步骤。active 状态只由 PlanCursor 表示，步骤记录里只保存终态，
//! 因此「两个 active 步骤」无法被构造出来。

use crate::core::AgentError;
use crate::memory::conversation::{new_id, now_millis};
use crate::plan::{ActionDraft, ActionStatus, PlanAction, PlanStep, StepDraft, StepStatus};

/// 计划游标：当前计划所处的位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanCursor {
    /// 尚无计划
    NoPlan,
    /// 没有 active 步骤，下一个可用步骤为 step_index（pending）
    Ready { step_index: usize },
    /// step_index 为唯一的 active 步骤
    Active { step_index: usize },
    /// 所有步骤都已完成或失败
    Exhausted,
}

/// append_action 的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppendResult {
    Appended { step_index: usize, action_id: String },
    /// 无可用步骤，未记录任何动作
    NoEligibleStep,
}

impl AppendResult {
    pub fn action_id(&self) -> Option<&str> {
        match self {
            AppendResult::Appended { action_id, .. } => Some(action_id),
            AppendResult::NoEligibleStep => None,
        }
    }
}

/// complete_active_step / fail_active_step 的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompleteResult {
    Finished { step_index: usize, status: StepStatus },
    /// 当前没有 active 步骤，未做任何变更
    NoEligibleStep,
}

impl CompleteResult {
    pub fn is_noop(&self) -> bool {
        matches!(self, CompleteResult::NoEligibleStep)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
}

#[derive(Clone, Debug)]
struct StepRecord {
    id: String,
    title: String,
    description: String,
    outcome: Option<Outcome>,
    actions: Vec<PlanAction>,
}

#[derive(Debug)]
pub struct PlanTracker {
    steps: Vec<StepRecord>,
    cursor: PlanCursor,
}

impl PlanTracker {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cursor: PlanCursor::NoPlan,
        }
    }

    /// 丢弃现有计划并安装新计划：全部 pending、无动作
    pub fn replace_plan(&mut self, drafts: Vec<StepDraft>) -> Result<(), AgentError> {
        if drafts.is_empty() {
            return Err(AgentError::InvalidPlan(
                "plan must contain at least one step".to_string(),
            ));
        }
        if let Some(pos) = drafts.iter().position(|d| d.title.trim().is_empty()) {
            return Err(AgentError::InvalidPlan(format!(
                "step {} has no title",
                pos + 1
            )));
        }

        self.steps = drafts
            .into_iter()
            .map(|d| StepRecord {
                id: new_id(),
                title: d.title,
                description: d.description,
                outcome: None,
                actions: Vec::new(),
            })
            .collect();
        self.cursor = PlanCursor::Ready { step_index: 0 };
        tracing::debug!(steps = self.steps.len(), "plan replaced");
        Ok(())
    }

    /// 追加动作到 active 步骤；没有 active 时提升首个 pending 步骤
    pub fn append_action(&mut self, draft: ActionDraft) -> AppendResult {
        let step_index = match self.cursor {
            PlanCursor::Active { step_index } => step_index,
            PlanCursor::Ready { step_index } => {
                self.cursor = PlanCursor::Active { step_index };
                tracing::debug!(step_index, "plan step activated");
                step_index
            }
            PlanCursor::NoPlan | PlanCursor::Exhausted => {
                tracing::debug!(content = %draft.content, "no eligible step for action");
                return AppendResult::NoEligibleStep;
            }
        };

        let action = PlanAction {
            id: new_id(),
            kind: draft.kind,
            content: draft.content,
            status: draft.status,
            timestamp: now_millis(),
        };
        let action_id = action.id.clone();
        self.steps[step_index].actions.push(action);
        AppendResult::Appended {
            step_index,
            action_id,
        }
    }

    pub fn complete_active_step(&mut self) -> CompleteResult {
        self.finish_active(Outcome::Completed)
    }

    pub fn fail_active_step(&mut self) -> CompleteResult {
        self.finish_active(Outcome::Failed)
    }

    fn finish_active(&mut self, outcome: Outcome) -> CompleteResult {
        let PlanCursor::Active { step_index } = self.cursor else {
            return CompleteResult::NoEligibleStep;
        };
        self.steps[step_index].outcome = Some(outcome);
        self.cursor = if step_index + 1 < self.steps.len() {
            PlanCursor::Ready {
                step_index: step_index + 1,
            }
        } else {
            PlanCursor::Exhausted
        };
        let status = match outcome {
            Outcome::Completed => StepStatus::Completed,
            Outcome::Failed => StepStatus::Failed,
        };
        tracing::debug!(step_index, ?status, "plan step finished");
        CompleteResult::Finished { step_index, status }
    }

    /// 将 running 动作落定为 completed / failed；只对 running 动作生效
    pub fn settle_action(&mut self, action_id: &str, status: ActionStatus) -> bool {
        if status == ActionStatus::Running {
            return false;
        }
        let found = self
            .steps
            .iter_mut()
            .flat_map(|s| s.actions.iter_mut())
            .find(|a| a.id == action_id);
        match found {
            Some(action) if action.status == ActionStatus::Running => {
                action.status = status;
                true
            }
            _ => false,
        }
    }

    /// 回合中断时使用：active 步骤里仍为 running 的动作全部落定为 status，返回落定数量
    pub fn settle_active_running(&mut self, status: ActionStatus) -> usize {
        let Some(step_index) = self.active_step_index() else {
            return 0;
        };
        if status == ActionStatus::Running {
            return 0;
        }
        let mut settled = 0;
        for action in &mut self.steps[step_index].actions {
            if action.status == ActionStatus::Running {
                action.status = status;
                settled += 1;
            }
        }
        settled
    }

    pub fn cursor(&self) -> PlanCursor {
        self.cursor
    }

    pub fn active_step_index(&self) -> Option<usize> {
        match self.cursor {
            PlanCursor::Active { step_index } => Some(step_index),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// 清空计划（切换会话时）
    pub fn reset(&mut self) {
        self.steps.clear();
        self.cursor = PlanCursor::NoPlan;
    }

    fn status_of(&self, index: usize) -> StepStatus {
        match self.steps[index].outcome {
            Some(Outcome::Completed) => StepStatus::Completed,
            Some(Outcome::Failed) => StepStatus::Failed,
            None if self.cursor == (PlanCursor::Active { step_index: index }) => StepStatus::Active,
            None => StepStatus::Pending,
        }
    }

    /// 只读快照，供展示层渲染
    pub fn snapshot(&self) -> Vec<PlanStep> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, s)| PlanStep {
                id: s.id.clone(),
                title: s.title.clone(),
                description: s.description.clone(),
                status: self.status_of(i),
                actions: s.actions.clone(),
            })
            .collect()
    }
}

impl Default for PlanTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ActionKind;

    fn two_steps() -> Vec<StepDraft> {
        vec![
            StepDraft::new("Research", "Look things up"),
            StepDraft::new("Build", "Write the script"),
        ]
    }

    fn info(content: &str) -> ActionDraft {
        ActionDraft::completed(ActionKind::Info, content)
    }

    fn active_count(tracker: &PlanTracker) -> usize {
        tracker
            .snapshot()
            .iter()
            .filter(|s| s.status == StepStatus::Active)
            .count()
    }

    #[test]
    fn test_append_on_empty_plan_is_noop() {
        let mut tracker = PlanTracker::new();
        for i in 0..5 {
            let result = tracker.append_action(info(&format!("note {i}")));
            assert_eq!(result, AppendResult::NoEligibleStep);
        }
        assert!(tracker.snapshot().is_empty());
        assert_eq!(tracker.cursor(), PlanCursor::NoPlan);
    }

    #[test]
    fn test_replace_plan_rejects_empty_and_untitled() {
        let mut tracker = PlanTracker::new();
        assert!(matches!(
            tracker.replace_plan(vec![]),
            Err(AgentError::InvalidPlan(_))
        ));
        assert!(matches!(
            tracker.replace_plan(vec![StepDraft::new("ok", ""), StepDraft::new("  ", "x")]),
            Err(AgentError::InvalidPlan(msg)) if msg.contains("step 2")
        ));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_replace_plan_discards_previous_plan() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(two_steps()).unwrap();
        tracker.append_action(info("a"));
        tracker.complete_active_step();

        tracker
            .replace_plan(vec![StepDraft::new("Fresh", "")])
            .unwrap();
        let snap = tracker.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].status, StepStatus::Pending);
        assert!(snap[0].actions.is_empty());
        assert_eq!(tracker.cursor(), PlanCursor::Ready { step_index: 0 });
    }

    #[test]
    fn test_active_step_is_lowest_non_terminal() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(two_steps()).unwrap();
        assert_eq!(active_count(&tracker), 0);

        let result = tracker.append_action(info("first"));
        assert!(matches!(result, AppendResult::Appended { step_index: 0, .. }));
        assert_eq!(active_count(&tracker), 1);
        assert_eq!(tracker.snapshot()[0].status, StepStatus::Active);
        assert_eq!(tracker.snapshot()[1].status, StepStatus::Pending);

        tracker.append_action(info("second"));
        assert_eq!(tracker.snapshot()[0].actions.len(), 2);

        tracker.complete_active_step();
        assert_eq!(active_count(&tracker), 0);

        let result = tracker.append_action(info("third"));
        assert!(matches!(result, AppendResult::Appended { step_index: 1, .. }));
        let snap = tracker.snapshot();
        assert_eq!(snap[0].status, StepStatus::Completed);
        assert_eq!(snap[1].status, StepStatus::Active);
        assert_eq!(active_count(&tracker), 1);
    }

    #[test]
    fn test_double_complete_is_reported_noop() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(two_steps()).unwrap();
        tracker.append_action(info("work"));

        assert_eq!(
            tracker.complete_active_step(),
            CompleteResult::Finished {
                step_index: 0,
                status: StepStatus::Completed
            }
        );
        let second = tracker.complete_active_step();
        assert_eq!(second, CompleteResult::NoEligibleStep);
        assert!(second.is_noop());
        // 第二步未被意外完成
        assert_eq!(tracker.snapshot()[1].status, StepStatus::Pending);
    }

    #[test]
    fn test_exhausted_plan_rejects_actions() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(vec![StepDraft::new("Only", "")]).unwrap();
        tracker.append_action(info("work"));
        tracker.complete_active_step();
        assert_eq!(tracker.cursor(), PlanCursor::Exhausted);

        assert_eq!(tracker.append_action(info("late")), AppendResult::NoEligibleStep);
        assert_eq!(tracker.snapshot()[0].actions.len(), 1);
    }

    #[test]
    fn test_failed_step_is_not_reactivated() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(two_steps()).unwrap();
        tracker.append_action(info("try"));
        assert!(matches!(
            tracker.fail_active_step(),
            CompleteResult::Finished {
                step_index: 0,
                status: StepStatus::Failed
            }
        ));

        tracker.append_action(info("next"));
        let snap = tracker.snapshot();
        assert_eq!(snap[0].status, StepStatus::Failed);
        assert_eq!(snap[0].actions.len(), 1);
        assert_eq!(snap[1].status, StepStatus::Active);
    }

    #[test]
    fn test_settle_action_only_moves_running() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(two_steps()).unwrap();
        let AppendResult::Appended { action_id, .. } =
            tracker.append_action(ActionDraft::running(ActionKind::Command, "curl x"))
        else {
            panic!("expected append");
        };

        assert!(!tracker.settle_action(&action_id, ActionStatus::Running));
        assert!(tracker.settle_action(&action_id, ActionStatus::Completed));
        assert!(!tracker.settle_action(&action_id, ActionStatus::Failed));
        assert!(!tracker.settle_action("missing", ActionStatus::Failed));
        assert_eq!(
            tracker.snapshot()[0].actions[0].status,
            ActionStatus::Completed
        );
    }

    #[test]
    fn test_settle_active_running_leaves_finished_steps_alone() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(two_steps()).unwrap();
        tracker.append_action(ActionDraft::running(ActionKind::Command, "first"));
        tracker.complete_active_step();
        tracker.append_action(ActionDraft::running(ActionKind::Command, "second"));
        tracker.append_action(info("done"));

        assert_eq!(tracker.settle_active_running(ActionStatus::Failed), 1);
        let snap = tracker.snapshot();
        assert_eq!(snap[0].actions[0].status, ActionStatus::Running);
        assert_eq!(snap[1].actions[0].status, ActionStatus::Failed);
        assert_eq!(snap[1].actions[1].status, ActionStatus::Completed);
        assert_eq!(tracker.settle_active_running(ActionStatus::Failed), 0);
    }

    #[test]
    fn test_reset_returns_to_no_plan() {
        let mut tracker = PlanTracker::new();
        tracker.replace_plan(two_steps()).unwrap();
        tracker.append_action(info("x"));
        tracker.reset();
        assert!(tracker.is_empty());
        assert_eq!(tracker.cursor(), PlanCursor::NoPlan);
        assert_eq!(tracker.complete_active_step(), CompleteResult::NoEligibleStep);
    }
}
