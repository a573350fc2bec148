//! 会话监管：回合生命周期与中断
//!
//! 每个回合拿一个新的 CancellationToken；Cancel / 新任务 / 切换会话时取消当前回合。

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct SessionSupervisor {
    current: Mutex<Option<CancellationToken>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始新回合：取消上一个回合（若仍在进行）并返回新令牌
    pub fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut guard = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = guard.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// 回合正常结束后释放令牌
    pub fn end_turn(&self) {
        let mut guard = self.current.lock().unwrap_or_else(|p| p.into_inner());
        guard.take();
    }

    /// 取消当前回合；没有进行中的回合时返回 false
    pub fn cancel(&self) -> bool {
        let guard = self.current.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_without_turn_is_noop() {
        let supervisor = SessionSupervisor::new();
        assert!(!supervisor.cancel());
    }

    #[test]
    fn test_begin_turn_cancels_previous() {
        let supervisor = SessionSupervisor::new();
        let first = supervisor.begin_turn();
        let second = supervisor.begin_turn();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(supervisor.cancel());
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_end_turn_releases_token() {
        let supervisor = SessionSupervisor::new();
        let token = supervisor.begin_turn();
        supervisor.end_turn();
        assert!(!supervisor.cancel());
        assert!(!token.is_cancelled());
    }
}
