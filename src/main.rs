//! Nexa - 智能体回合执行核心
//!
//! 入口：初始化日志、加载配置与会话列表、创建 Agent 编排器，并运行行式控制台。
//! 用法：nexa [config.toml]

use std::path::PathBuf;

use anyhow::Context;
use nexa::config::{load_config, AppConfig};
use nexa::core::{create_agent, Command};
use nexa::llm::create_model_client;
use nexa::memory::SessionStore;
use nexa::ui::{parse_line, render_event, render_sessions, ConsoleInput, HELP};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nexa::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let store = SessionStore::open(&cfg.app.sessions_path).with_context(|| {
        format!(
            "Failed to open session store at {}",
            cfg.app.sessions_path.display()
        )
    })?;
    let client = create_model_client(&cfg);
    let app_name = cfg.app.name.clone().unwrap_or_else(|| "Nexa".to_string());

    let (cmd_tx, state_rx, mut event_rx, agent) = create_agent(cfg, client, store);

    // 事件打印
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Some(line) = render_event(&event) {
                println!("{line}");
            }
        }
    });

    println!("{app_name} ready. Type a request, or /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_line(&line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Help => println!("{HELP}"),
            ConsoleInput::ListSessions => println!("{}", render_sessions(&state_rx.borrow())),
            ConsoleInput::Invalid(hint) => println!("{hint}"),
            ConsoleInput::Command(cmd) => {
                let quit = matches!(cmd, Command::Quit);
                cmd_tx
                    .send(cmd)
                    .map_err(|_| anyhow::anyhow!("agent loop has stopped"))?;
                if quit {
                    break;
                }
            }
        }
    }

    let _ = cmd_tx.send(Command::Quit);
    drop(cmd_tx);
    // 等待编排器处理完 Quit（含取消中的回合与落盘）
    agent.await.context("agent loop panicked")?;
    let _ = printer.await;
    Ok(())
}
