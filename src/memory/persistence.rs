//! 会话列表持久化
//!
//! 整个会话列表作为一个不透明 JSON 数组写入单文件；加载失败时（文件损坏）记录告警并从空列表开始。

use std::path::{Path, PathBuf};

use crate::memory::ChatSession;

/// 会话列表存储：内存中维护列表，变更后调用 save 落盘
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    sessions: Vec<ChatSession>,
}

impl SessionStore {
    /// 打开存储；文件不存在时为空列表
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let sessions = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Vec<ChatSession>>(&data) {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!("Failed to parse session list {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Ok(Self { path, sessions })
    }

    /// 不落盘的内存存储（测试用）
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            sessions: Vec::new(),
        }
    }

    /// 收藏在前，其余按创建时间倒序
    pub fn list(&self) -> Vec<&ChatSession> {
        let mut list: Vec<&ChatSession> = self.sessions.iter().collect();
        list.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then(b.created_at.cmp(&a.created_at))
        });
        list
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// 按 id 替换；不存在则插到最前
    pub fn upsert(&mut self, session: &ChatSession) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => self.sessions.insert(0, session.clone()),
        }
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let s = self.sessions.iter_mut().find(|s| s.id == id)?;
        s.is_favorite = !s.is_favorite;
        Some(s.is_favorite)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        self.sessions.len() != before
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// 写回 JSON 文件；父目录不存在时自动创建。内存存储不落盘
    pub fn save(&self) -> anyhow::Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.sessions)?)?;
        Ok(())
    }
}
