//! 工具执行引擎
//!
//! execute(tool_name, args, ctx)：先经 ToolRegistry 校验参数，再按名分发到各工具的模拟实现。
//! 工具内的错误（参数缺失、计划非法、未知工具）一律转成结果载荷交回模型，只有取消会以 Err 返回。
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::{AgentError, Scheduler};
use crate::memory::conversation::new_id;
use crate::plan::{ActionDraft, ActionStatus, AppendResult, CompleteResult, PlanTracker};
use crate::react::{AgentEvent, EventSink};
use crate::tools::{
    create_plan, visit_page, web_search, write_code, ToolRegistry, Workspace, CREATE_PLAN,
    VISIT_PAGE, WEB_SEARCH, WRITE_CODE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Running,
    Completed,
    Failed,
}

/// 一次工具调用（仅在调用期间存在，供展示层显示「当前调用」）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub args: Map<String, Value>,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolCall {
    pub fn running(tool_name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: new_id(),
            tool_name: tool_name.into(),
            args,
            status: ToolCallStatus::Running,
            result: None,
        }
    }
}

/// 工具执行结果：回给模型的载荷 + 调用状态
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutcome {
    pub payload: Value,
    pub status: ToolCallStatus,
}

impl ToolOutcome {
    fn ok(payload: Value) -> Self {
        Self {
            payload,
            status: ToolCallStatus::Completed,
        }
    }

    /// 未知工具：固定载荷 {"error": "Unknown tool"}
    fn unknown_tool() -> Self {
        Self {
            payload: json!({ "error": "Unknown tool" }),
            status: ToolCallStatus::Failed,
        }
    }

    fn error(err: &AgentError) -> Self {
        Self {
            payload: json!({ "error": err.to_string(), "kind": err.kind() }),
            status: ToolCallStatus::Failed,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolCallStatus::Failed
    }
}

/// 工具可见的宿主能力：计划、工作区旁路、事件通道、调度器
pub struct ToolContext<'a> {
    pub plan: &'a mut PlanTracker,
    pub workspace: &'a mut Workspace,
    pub scheduler: &'a Scheduler,
    pub events: Option<&'a EventSink>,
}

impl<'a> ToolContext<'a> {
    pub fn emit(&self, event: AgentEvent) {
        if let Some(sink) = self.events {
            sink.emit(event);
        }
    }

    fn publish_plan(&self) {
        self.emit(AgentEvent::PlanUpdated {
            steps: self.plan.snapshot(),
        });
    }

    /// 追加动作到当前步骤；无可用步骤时仅记录日志
    pub fn append(&mut self, draft: ActionDraft) -> AppendResult {
        let result = self.plan.append_action(draft);
        match result {
            AppendResult::Appended { .. } => self.publish_plan(),
            AppendResult::NoEligibleStep => {
                tracing::warn!(error = %AgentError::NoEligibleStep, "action dropped")
            }
        }
        result
    }

    pub fn settle(&mut self, action_id: &str, status: ActionStatus) {
        if self.plan.settle_action(action_id, status) {
            self.publish_plan();
        }
    }

    pub fn complete_step(&mut self) -> CompleteResult {
        let result = self.plan.complete_active_step();
        if result.is_noop() {
            tracing::warn!(error = %AgentError::NoEligibleStep, "step completion skipped");
        } else {
            self.publish_plan();
        }
        result
    }

    /// 打开结果查看器；已打开时不重复通知
    pub fn reveal_viewer(&mut self) {
        if self.workspace.reveal_viewer() {
            self.emit(AgentEvent::ViewerRevealed);
        }
    }

    /// 模拟耗时；被取消时把正在运行的动作标为 failed，避免其永远停在 running
    pub async fn pause(
        &mut self,
        duration: Duration,
        running_action: Option<&str>,
    ) -> Result<(), AgentError> {
        if let Err(e) = self.scheduler.sleep(duration).await {
            if let Some(id) = running_action {
                self.settle(id, ActionStatus::Failed);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// 取字符串参数；校验后仍缺失时返回 ToolArgument
pub(crate) fn str_arg<'v>(
    tool: &str,
    args: &'v Map<String, Value>,
    name: &str,
) -> Result<&'v str, AgentError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ToolArgument {
            tool: tool.to_string(),
            message: format!("missing required argument `{name}`"),
        })
}

/// 工具执行引擎：持有 ToolRegistry，按名分发
pub struct ToolExecutionEngine {
    registry: ToolRegistry,
}

impl ToolExecutionEngine {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行一次工具调用；只有取消会返回 Err，其余错误均为结果载荷
    pub async fn execute(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutcome, AgentError> {
        let start = Instant::now();
        let result = self.dispatch(tool_name, args, ctx).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AgentError::Cancelled) => "cancelled",
            Err(e) => e.kind(),
        };
        let audit = json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(args),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(payload) => Ok(ToolOutcome::ok(payload)),
            Err(AgentError::Cancelled) => Err(AgentError::Cancelled),
            Err(AgentError::UnknownTool(_)) => Ok(ToolOutcome::unknown_tool()),
            Err(e) => Ok(ToolOutcome::error(&e)),
        }
    }

    async fn dispatch(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
        ctx: &mut ToolContext<'_>,
    ) -> Result<Value, AgentError> {
        self.registry.describe(tool_name)?.validate(args)?;
        match tool_name {
            CREATE_PLAN => create_plan::run(args, ctx),
            WEB_SEARCH => web_search::run(args, ctx).await,
            VISIT_PAGE => visit_page::run(args, ctx).await,
            WRITE_CODE => write_code::run(args, ctx).await,
            other => Err(AgentError::UnknownTool(other.to_string())),
        }
    }
}

impl Default for ToolExecutionEngine {
    fn default() -> Self {
        Self::new(ToolRegistry::builtin())
    }
}

fn args_preview(args: &Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ActionKind, StepStatus};
    use crate::tools::{ArgKind, ArgSpec, ToolSchema};
    use tokio::sync::mpsc;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    struct Harness {
        plan: PlanTracker,
        workspace: Workspace,
        scheduler: Scheduler,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                plan: PlanTracker::new(),
                workspace: Workspace::new(),
                scheduler: Scheduler::immediate(),
            }
        }

        async fn run(&mut self, tool: &str, value: Value) -> ToolOutcome {
            let engine = ToolExecutionEngine::default();
            let mut ctx = ToolContext {
                plan: &mut self.plan,
                workspace: &mut self.workspace,
                scheduler: &self.scheduler,
                events: None,
            };
            engine.execute(tool, &args(value), &mut ctx).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_payload() {
        let mut h = Harness::new();
        let outcome = h.run("launch_rocket", json!({})).await;
        assert_eq!(outcome.payload, json!({"error": "Unknown tool"}));
        assert!(outcome.is_error());
    }

    #[tokio::test]
    async fn test_registered_but_unhandled_tool_is_unknown() {
        let mut registry = ToolRegistry::builtin();
        registry.register(ToolSchema {
            name: "note",
            description: "registered without a handler",
            args: vec![ArgSpec::optional("text", ArgKind::String)],
            parameters: json!({"type": "object"}),
        });
        let engine = ToolExecutionEngine::new(registry);
        let mut h = Harness::new();
        let mut ctx = ToolContext {
            plan: &mut h.plan,
            workspace: &mut h.workspace,
            scheduler: &h.scheduler,
            events: None,
        };
        let outcome = engine.execute("note", &Map::new(), &mut ctx).await.unwrap();
        assert_eq!(outcome.payload, json!({"error": "Unknown tool"}));
    }

    #[tokio::test]
    async fn test_missing_arguments_become_argument_error() {
        let mut h = Harness::new();
        for tool in ["create_plan", "web_search", "visit_page", "write_code"] {
            let outcome = h.run(tool, json!({})).await;
            assert!(outcome.is_error(), "{tool} should fail");
            assert_eq!(outcome.payload["kind"], "ToolArgumentError", "{tool}");
        }
        assert!(h.plan.is_empty());
        assert!(h.workspace.files().is_empty());
    }

    #[tokio::test]
    async fn test_create_plan_with_untitled_step_is_invalid_plan() {
        let mut h = Harness::new();
        let outcome = h
            .run("create_plan", json!({"steps": [{"description": "no title"}]}))
            .await;
        assert_eq!(outcome.payload["kind"], "InvalidPlan");
        assert!(h.plan.is_empty());

        let outcome = h.run("create_plan", json!({"steps": []})).await;
        assert_eq!(outcome.payload["kind"], "InvalidPlan");
    }

    #[tokio::test]
    async fn test_create_plan_then_write_code_round_trip() {
        let mut h = Harness::new();
        let outcome = h
            .run(
                "create_plan",
                json!({"steps": [
                    {"title": "Write script", "description": "hello world"},
                    {"title": "Report", "description": "summarize"}
                ]}),
            )
            .await;
        assert!(!outcome.is_error());

        let outcome = h
            .run(
                "write_code",
                json!({"code": "print('hi')", "filename": "hello.py"}),
            )
            .await;
        assert!(outcome.payload["stdout"]
            .as_str()
            .unwrap()
            .contains("exited with code 0"));

        let snap = h.plan.snapshot();
        assert_eq!(snap[0].status, StepStatus::Completed);
        assert_eq!(snap[1].status, StepStatus::Pending);
        assert!(snap[1].actions.is_empty());

        let log: Vec<(ActionKind, ActionStatus)> =
            snap[0].actions.iter().map(|a| (a.kind, a.status)).collect();
        assert_eq!(
            log,
            vec![
                (ActionKind::Command, ActionStatus::Running),
                (ActionKind::File, ActionStatus::Completed),
                (ActionKind::Command, ActionStatus::Running),
                (ActionKind::Output, ActionStatus::Completed),
            ]
        );

        assert_eq!(h.workspace.files().len(), 1);
        assert_eq!(h.workspace.files()[0].language, "python");
    }

    #[tokio::test]
    async fn test_tools_without_plan_still_return_results() {
        let mut h = Harness::new();
        let outcome = h.run("visit_page", json!({"url": "https://example.com/a"})).await;
        assert!(!outcome.is_error());
        assert!(outcome.payload["content"]
            .as_str()
            .unwrap()
            .contains("https://example.com/a"));
        assert!(h.plan.is_empty());
        assert_eq!(
            h.workspace.last_web_content().unwrap().url,
            "https://example.com/a"
        );
    }

    #[tokio::test]
    async fn test_viewer_revealed_event_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new().with_events(tx);
        let engine = ToolExecutionEngine::default();
        let mut h = Harness::new();
        for query in ["rust", "tokio"] {
            let mut ctx = ToolContext {
                plan: &mut h.plan,
                workspace: &mut h.workspace,
                scheduler: &h.scheduler,
                events: Some(&sink),
            };
            engine
                .execute("web_search", &args(json!({"query": query})), &mut ctx)
                .await
                .unwrap();
        }
        drop(sink);
        let mut revealed = 0;
        while let Some(ev) = rx.recv().await {
            if matches!(ev, AgentEvent::ViewerRevealed) {
                revealed += 1;
            }
        }
        assert_eq!(revealed, 1);
        assert!(h.workspace.is_viewer_open());
    }

    #[test]
    fn test_plan_mutations_without_plan_emit_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new().with_events(tx);
        let mut h = Harness::new();
        let mut ctx = ToolContext {
            plan: &mut h.plan,
            workspace: &mut h.workspace,
            scheduler: &h.scheduler,
            events: Some(&sink),
        };
        let appended = ctx.append(ActionDraft::running(ActionKind::Command, "orphan"));
        assert_eq!(appended, AppendResult::NoEligibleStep);
        assert!(ctx.complete_step().is_noop());
        assert!(rx.try_recv().is_err());
        assert!(h.plan.is_empty());
    }
}
