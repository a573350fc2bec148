//! web_search：模拟搜索
//!
//! 记录一条 running 的命令动作，等待模拟延迟后打开结果查看器并记录 info 动作，
//! 返回三条由 query 确定性派生的结果（title / snippet / url）。

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::core::AgentError;
use crate::plan::{ActionDraft, ActionKind};
use crate::tools::executor::str_arg;
use crate::tools::{ToolContext, WEB_SEARCH};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// 由 query 生成固定形状的结果
pub fn synthesize_results(query: &str) -> Vec<SearchHit> {
    let slug = slugify(query);
    vec![
        SearchHit {
            title: format!("{query} - Official Documentation"),
            snippet: "Comprehensive guide and documentation...".to_string(),
            url: format!("https://docs.example.com/{slug}"),
        },
        SearchHit {
            title: format!("Latest news on {query}"),
            snippet: "Breaking news and updates regarding...".to_string(),
            url: format!("https://news.example.com/article/{slug}"),
        },
        SearchHit {
            title: format!("{query} Tutorial"),
            snippet: "Step by step tutorial for beginners...".to_string(),
            url: format!("https://tutorial.example.com/{slug}"),
        },
    ]
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "search".to_string()
    } else {
        slug.to_string()
    }
}

pub(crate) async fn run(
    args: &Map<String, Value>,
    ctx: &mut ToolContext<'_>,
) -> Result<Value, AgentError> {
    let query = str_arg(WEB_SEARCH, args, "query")?;
    let delays = ctx.scheduler.delays().clone();

    let running = ctx.append(ActionDraft::running(
        ActionKind::Command,
        format!("Searching the web for: \"{query}\""),
    ));
    ctx.pause(delays.search(), running.action_id()).await?;

    ctx.reveal_viewer();
    let results = synthesize_results(query);
    ctx.append(ActionDraft::completed(
        ActionKind::Info,
        format!("Found {} relevant results", results.len()),
    ));
    ctx.pause(delays.search_settle(), None).await?;

    Ok(json!({ "results": results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_are_deterministic() {
        let a = synthesize_results("Rust async");
        let b = synthesize_results("Rust async");
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(a[0].title, "Rust async - Official Documentation");
        assert_eq!(a[0].url, "https://docs.example.com/rust-async");
    }

    #[test]
    fn test_slugify_edge_cases() {
        assert_eq!(slugify("  What is 2+2?  "), "what-is-2-2");
        assert_eq!(slugify("???"), "search");
    }
}
