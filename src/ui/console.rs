//! 行式控制台
//!
//! 把 AgentEvent 渲染为文本行，把输入行解析为 Command（以 / 开头的是会话管理指令，其余为提交）。

use crate::config::ModelMode;
use crate::core::{AgentSnapshot, Command, SettingsUpdate};
use crate::memory::Role;
use crate::plan::{ActionStatus, StepStatus};
use crate::react::AgentEvent;
use crate::tools::ToolCallStatus;

/// 单条消息显示的最大字符数
const MAX_DISPLAY_CHARS: usize = 600;
/// 工具结果显示上限（多为 JSON）
const MAX_TOOL_DISPLAY_CHARS: usize = 200;

pub const HELP: &str = "\
commands:
  /new                 start a new task
  /sessions            list saved sessions
  /load <id>           switch to a saved session
  /rename <id> <name>  rename a session
  /fav <id>            toggle favorite
  /delete <id>         delete a session
  /temp <value>        set temperature
  /mode fast|max       switch model tier
  /cancel              stop the running turn
  /quit                exit";

/// 对过长内容做折叠：保留前 N 字 + 省略提示
pub fn truncate_for_display(content: &str, limit: usize) -> String {
    let total = content.chars().count();
    if total <= limit {
        return content.to_string();
    }
    let head: String = content.chars().take(limit).collect();
    format!("{head}\n... [{total} chars total]")
}

/// 控制台输入的解析结果
#[derive(Debug, Clone)]
pub enum ConsoleInput {
    Command(Command),
    ListSessions,
    Help,
    Empty,
    /// 无法识别的指令（附提示）
    Invalid(String),
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ConsoleInput::Command(Command::Submit(line.to_string()));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let need_arg = |usage: &str| ConsoleInput::Invalid(format!("usage: {usage}"));

    match name {
        "new" => ConsoleInput::Command(Command::NewTask),
        "sessions" => ConsoleInput::ListSessions,
        "help" => ConsoleInput::Help,
        "cancel" => ConsoleInput::Command(Command::Cancel),
        "quit" | "exit" => ConsoleInput::Command(Command::Quit),
        "load" if !arg.is_empty() => ConsoleInput::Command(Command::LoadSession(arg.to_string())),
        "load" => need_arg("/load <id>"),
        "fav" if !arg.is_empty() => ConsoleInput::Command(Command::ToggleFavorite(arg.to_string())),
        "fav" => need_arg("/fav <id>"),
        "delete" if !arg.is_empty() => {
            ConsoleInput::Command(Command::DeleteSession(arg.to_string()))
        }
        "delete" => need_arg("/delete <id>"),
        "rename" => match arg.split_once(char::is_whitespace) {
            Some((id, name)) if !name.trim().is_empty() => {
                ConsoleInput::Command(Command::RenameSession {
                    id: id.to_string(),
                    name: name.trim().to_string(),
                })
            }
            _ => need_arg("/rename <id> <name>"),
        },
        "temp" => match arg.parse::<f32>() {
            Ok(t) if (0.0..=2.0).contains(&t) => {
                ConsoleInput::Command(Command::UpdateSettings(SettingsUpdate {
                    temperature: Some(t),
                    ..SettingsUpdate::default()
                }))
            }
            _ => need_arg("/temp <0.0-2.0>"),
        },
        "mode" => {
            let mode = match arg {
                "fast" => ModelMode::Fast,
                "max" => ModelMode::Max,
                _ => return need_arg("/mode fast|max"),
            };
            ConsoleInput::Command(Command::UpdateSettings(SettingsUpdate {
                model_mode: Some(mode),
                ..SettingsUpdate::default()
            }))
        }
        other => ConsoleInput::Invalid(format!("unknown command /{other}, try /help")),
    }
}

fn step_marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "[ ]",
        StepStatus::Active => "[>]",
        StepStatus::Completed => "[x]",
        StepStatus::Failed => "[!]",
    }
}

fn action_marker(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Running => "..",
        ActionStatus::Completed => "ok",
        ActionStatus::Failed => "!!",
    }
}

/// 把一个事件渲染为要打印的文本；不需要展示的事件返回 None
pub fn render_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::PhaseChanged { .. } | AgentEvent::RoundStarted { .. } => None,
        AgentEvent::MessageAppended { message } => match message.role {
            Role::Agent => Some(format!(
                "nexa> {}",
                truncate_for_display(&message.content, MAX_DISPLAY_CHARS)
            )),
            Role::System => Some(format!("[system] {}", message.content)),
            Role::User => None,
        },
        AgentEvent::PlanUpdated { steps } if steps.is_empty() => None,
        AgentEvent::PlanUpdated { steps } => {
            let mut out = String::from("plan:");
            for step in steps {
                out.push_str(&format!("\n  {} {}", step_marker(step.status), step.title));
                if step.status == StepStatus::Active {
                    if let Some(action) = step.actions.last() {
                        out.push_str(&format!(
                            "\n      {} {}",
                            action_marker(action.status),
                            action.content
                        ));
                    }
                }
            }
            Some(out)
        }
        AgentEvent::ToolCallStarted { call } => Some(format!(
            "  -> {}({})",
            call.tool_name,
            truncate_for_display(
                &serde_json::Value::Object(call.args.clone()).to_string(),
                MAX_TOOL_DISPLAY_CHARS
            )
        )),
        AgentEvent::ToolCallFinished { call } => {
            let status = match call.status {
                ToolCallStatus::Completed => "done",
                ToolCallStatus::Failed => "failed",
                ToolCallStatus::Running => "running",
            };
            let result = call
                .result
                .as_ref()
                .map(|r| truncate_for_display(&r.to_string(), MAX_TOOL_DISPLAY_CHARS))
                .unwrap_or_default();
            Some(format!("  <- {} {}: {}", call.tool_name, status, result))
        }
        AgentEvent::ViewerRevealed => Some("  (viewer opened)".to_string()),
        AgentEvent::FileWritten { file } => {
            Some(format!("  file {} ({})", file.name, file.language))
        }
        AgentEvent::WebContentLoaded { content } => {
            Some(format!("  page {} [{}]", content.title, content.url))
        }
        AgentEvent::SubmissionRejected { text } if text.trim().is_empty() => None,
        AgentEvent::SubmissionRejected { .. } => {
            Some("busy: wait for the current turn or /cancel".to_string())
        }
        AgentEvent::SessionTitled { name, .. } => Some(format!("  (session titled \"{name}\")")),
    }
}

/// 会话列表
pub fn render_sessions(snapshot: &AgentSnapshot) -> String {
    if snapshot.sessions.is_empty() {
        return "no saved sessions".to_string();
    }
    snapshot
        .sessions
        .iter()
        .map(|s| {
            let current = snapshot.session_id.as_deref() == Some(s.id.as_str());
            format!(
                "{}{} {}  {}",
                if current { "*" } else { " " },
                if s.is_favorite { "★" } else { " " },
                s.id,
                s.name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;
    use crate::plan::{ActionKind, PlanAction, PlanStep};

    #[test]
    fn test_plain_text_is_submit() {
        match parse_line("  what is 2+2?  ") {
            ConsoleInput::Command(Command::Submit(text)) => assert_eq!(text, "what is 2+2?"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(parse_line("   "), ConsoleInput::Empty));
    }

    #[test]
    fn test_slash_commands() {
        assert!(matches!(parse_line("/new"), ConsoleInput::Command(Command::NewTask)));
        assert!(matches!(parse_line("/quit"), ConsoleInput::Command(Command::Quit)));
        assert!(matches!(
            parse_line("/load abc"),
            ConsoleInput::Command(Command::LoadSession(id)) if id == "abc"
        ));
        assert!(matches!(
            parse_line("/rename abc Rust notes"),
            ConsoleInput::Command(Command::RenameSession { id, name }) if id == "abc" && name == "Rust notes"
        ));
        assert!(matches!(parse_line("/load"), ConsoleInput::Invalid(_)));
        assert!(matches!(parse_line("/temp 9"), ConsoleInput::Invalid(_)));
        assert!(matches!(parse_line("/launch"), ConsoleInput::Invalid(_)));
    }

    #[test]
    fn test_render_agent_message_and_skip_user() {
        let ev = AgentEvent::MessageAppended {
            message: Message::agent("4"),
        };
        assert_eq!(render_event(&ev).as_deref(), Some("nexa> 4"));
        let ev = AgentEvent::MessageAppended {
            message: Message::user("2+2"),
        };
        assert!(render_event(&ev).is_none());
    }

    #[test]
    fn test_render_plan_shows_active_action() {
        let steps = vec![
            PlanStep {
                id: "1".into(),
                title: "Research".into(),
                description: String::new(),
                status: StepStatus::Active,
                actions: vec![PlanAction {
                    id: "a".into(),
                    kind: ActionKind::Command,
                    content: "curl https://example.com".into(),
                    status: ActionStatus::Running,
                    timestamp: 0,
                }],
            },
            PlanStep {
                id: "2".into(),
                title: "Write".into(),
                description: String::new(),
                status: StepStatus::Pending,
                actions: vec![],
            },
        ];
        let out = render_event(&AgentEvent::PlanUpdated { steps }).unwrap();
        assert!(out.contains("[>] Research"));
        assert!(out.contains(".. curl https://example.com"));
        assert!(out.contains("[ ] Write"));
    }

    #[test]
    fn test_truncate_for_display() {
        assert_eq!(truncate_for_display("short", 10), "short");
        let long = "x".repeat(30);
        assert!(truncate_for_display(&long, 10).ends_with("[30 chars total]"));
    }
}
