//! create_plan：安装新计划（替换已有计划）

use serde_json::{json, Map, Value};

use crate::core::AgentError;
use crate::plan::StepDraft;
use crate::tools::{ToolContext, CREATE_PLAN};

pub(crate) fn run(
    args: &Map<String, Value>,
    ctx: &mut ToolContext<'_>,
) -> Result<Value, AgentError> {
    let steps = args.get("steps").cloned().unwrap_or(Value::Null);
    let drafts: Vec<StepDraft> =
        serde_json::from_value(steps).map_err(|e| AgentError::ToolArgument {
            tool: CREATE_PLAN.to_string(),
            message: format!("`steps` is malformed: {e}"),
        })?;

    ctx.plan.replace_plan(drafts)?;
    ctx.emit(crate::react::AgentEvent::PlanUpdated {
        steps: ctx.plan.snapshot(),
    });
    tracing::info!(steps = ctx.plan.len(), "plan created");

    Ok(json!({ "status": "Plan created successfully. Proceed to execute steps." }))
}
