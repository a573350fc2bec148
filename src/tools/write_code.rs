//! write_code：模拟写文件并执行
//!
//! 动作顺序固定：command(running) -> file(completed) -> command(running) -> output(completed)，
//! 最后结束当前计划步骤。

use serde_json::{json, Map, Value};

use crate::core::AgentError;
use crate::plan::{ActionDraft, ActionKind};
use crate::react::AgentEvent;
use crate::tools::executor::str_arg;
use crate::tools::{FileArtifact, ToolContext, WRITE_CODE};

const SIMULATED_STDOUT: &str = "Process exited with code 0.\nOutput generated successfully.";

/// 由扩展名推断语言；无法识别时视为 python
pub fn language_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "rust",
        "js" | "mjs" => "javascript",
        "ts" => "typescript",
        "sh" => "shell",
        "go" => "go",
        _ => "python",
    }
}

fn run_command(language: &str, filename: &str) -> String {
    match language {
        "rust" => format!("rustc {filename} && ./a.out"),
        "javascript" => format!("node {filename}"),
        "typescript" => format!("ts-node {filename}"),
        "shell" => format!("bash {filename}"),
        "go" => format!("go run {filename}"),
        _ => format!("python3 {filename}"),
    }
}

pub(crate) async fn run(
    args: &Map<String, Value>,
    ctx: &mut ToolContext<'_>,
) -> Result<Value, AgentError> {
    let code = str_arg(WRITE_CODE, args, "code")?;
    let filename = str_arg(WRITE_CODE, args, "filename")?;
    let delays = ctx.scheduler.delays().clone();
    let language = language_for(filename);

    let writing = ctx.append(ActionDraft::running(
        ActionKind::Command,
        format!("cat > {filename} << 'EOF' ..."),
    ));
    ctx.pause(delays.write(), writing.action_id()).await?;

    let file = FileArtifact {
        name: filename.to_string(),
        language: language.to_string(),
        content: code.to_string(),
    };
    ctx.workspace.upsert_file(file.clone());
    ctx.emit(AgentEvent::FileWritten { file });
    ctx.reveal_viewer();
    ctx.append(ActionDraft::completed(
        ActionKind::File,
        format!("Created file: {filename}"),
    ));
    ctx.pause(delays.write_settle(), None).await?;

    let executing = ctx.append(ActionDraft::running(
        ActionKind::Command,
        run_command(language, filename),
    ));
    ctx.pause(delays.execute(), executing.action_id()).await?;
    ctx.append(ActionDraft::completed(
        ActionKind::Output,
        "Process exited with code 0",
    ));
    ctx.complete_step();

    Ok(json!({ "stdout": SIMULATED_STDOUT }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_extension() {
        assert_eq!(language_for("main.rs"), "rust");
        assert_eq!(language_for("scrape.PY"), "python");
        assert_eq!(language_for("index.js"), "javascript");
        assert_eq!(language_for("Makefile"), "python");
    }

    #[test]
    fn test_run_command_matches_language() {
        assert_eq!(run_command("python", "a.py"), "python3 a.py");
        assert_eq!(run_command("shell", "run.sh"), "bash run.sh");
    }
}
