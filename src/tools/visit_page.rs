//! visit_page：模拟抓取网页
//!
//! 与其他工具不同，访问页面总是结束当前计划步骤。

use serde_json::{json, Map, Value};

use crate::core::AgentError;
use crate::plan::{ActionDraft, ActionKind, ActionStatus};
use crate::react::AgentEvent;
use crate::tools::executor::str_arg;
use crate::tools::{ToolContext, WebContent, VISIT_PAGE};

/// 按 url 生成确定性的页面内容
pub fn synthesize_page(url: &str) -> String {
    format!(
        "# Content from {url}\n\
         \n\
         This is simulated page content for the requested URL.\n\
         It contains information relevant to the user's query.\n\
         \n\
         ## Section 1: Overview\n\
         The topic discussed is complex and involves multiple factors.\n\
         \n\
         ## Section 2: Technical Details\n\
         - Point A: Critical data\n\
         - Point B: Secondary data\n\
         \n\
         (End of scraped content)"
    )
}

fn page_title(url: &str) -> String {
    let host = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default();
    if host.is_empty() {
        "Simulated Web Page".to_string()
    } else {
        format!("Simulated Web Page: {host}")
    }
}

pub(crate) async fn run(
    args: &Map<String, Value>,
    ctx: &mut ToolContext<'_>,
) -> Result<Value, AgentError> {
    let url = str_arg(VISIT_PAGE, args, "url")?;
    let delays = ctx.scheduler.delays().clone();

    let running = ctx.append(ActionDraft::running(
        ActionKind::Command,
        format!("curl {url}"),
    ));
    ctx.pause(delays.visit(), running.action_id()).await?;

    let content = synthesize_page(url);
    let page = WebContent {
        title: page_title(url),
        url: url.to_string(),
        content: content.clone(),
    };
    ctx.workspace.set_web_content(page.clone());
    ctx.emit(AgentEvent::WebContentLoaded { content: page });
    ctx.reveal_viewer();

    if let Some(id) = running.action_id() {
        ctx.settle(id, ActionStatus::Completed);
    }
    ctx.append(ActionDraft::completed(
        ActionKind::File,
        format!("parsed content from {url}"),
    ));
    ctx.complete_step();

    Ok(json!({ "content": content }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Scheduler;
    use crate::plan::{PlanTracker, StepDraft, StepStatus};
    use crate::tools::Workspace;

    #[test]
    fn test_page_title_uses_host() {
        assert_eq!(
            page_title("https://docs.example.com/rust"),
            "Simulated Web Page: docs.example.com"
        );
        assert_eq!(page_title(""), "Simulated Web Page");
    }

    #[tokio::test]
    async fn test_visit_completes_active_step() {
        let mut plan = PlanTracker::new();
        plan.replace_plan(vec![StepDraft::new("Read", ""), StepDraft::new("Write", "")])
            .unwrap();
        let mut workspace = Workspace::new();
        let scheduler = Scheduler::immediate();
        let mut ctx = ToolContext {
            plan: &mut plan,
            workspace: &mut workspace,
            scheduler: &scheduler,
            events: None,
        };
        let args = json!({"url": "https://example.com"});
        run(args.as_object().unwrap(), &mut ctx).await.unwrap();

        let snap = plan.snapshot();
        assert_eq!(snap[0].status, StepStatus::Completed);
        assert_eq!(snap[1].status, StepStatus::Pending);
        assert_eq!(snap[0].actions.len(), 2);
        assert_eq!(snap[0].actions[0].kind, ActionKind::Command);
        assert_eq!(snap[0].actions[0].status, ActionStatus::Completed);
        assert_eq!(snap[0].actions[1].kind, ActionKind::File);
        assert!(workspace.is_viewer_open());
    }
}
