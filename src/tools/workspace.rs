//! 工作区旁路：工具产生的文件、最近抓取的网页内容、结果查看器是否已打开
//!
//! 由当前会话独占；切换会话时 reset。

use serde::{Deserialize, Serialize};

/// write_code 写入的文件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileArtifact {
    pub name: String,
    pub language: String,
    pub content: String,
}

/// visit_page 抓取的内容
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebContent {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Clone, Debug, Default)]
pub struct Workspace {
    files: Vec<FileArtifact>,
    last_web_content: Option<WebContent>,
    viewer_open: bool,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开查看器；已打开时为 no-op。返回是否发生了状态变化
    pub fn reveal_viewer(&mut self) -> bool {
        if self.viewer_open {
            return false;
        }
        self.viewer_open = true;
        true
    }

    pub fn is_viewer_open(&self) -> bool {
        self.viewer_open
    }

    /// 同名文件覆盖，否则追加
    pub fn upsert_file(&mut self, file: FileArtifact) {
        match self.files.iter_mut().find(|f| f.name == file.name) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }

    pub fn files(&self) -> &[FileArtifact] {
        &self.files
    }

    pub fn set_web_content(&mut self, content: WebContent) {
        self.last_web_content = Some(content);
    }

    pub fn last_web_content(&self) -> Option<&WebContent> {
        self.last_web_content.as_ref()
    }

    pub fn reset(&mut self) {
        self.files.clear();
        self.last_web_content = None;
        self.viewer_open = false;
    }
}
