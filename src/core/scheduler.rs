//! 调度：工具模拟延迟与取消
//!
//! 工具的「耗时」是可取消的定时等待：sleep 与 CancellationToken 竞争，取消先到则返回 Cancelled。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::DelaySection;
use crate::core::AgentError;

/// 单回合调度器：持有延迟配置与本回合的取消令牌
#[derive(Debug, Clone)]
pub struct Scheduler {
    delays: DelaySection,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(delays: DelaySection, cancel: CancellationToken) -> Self {
        Self { delays, cancel }
    }

    /// 零延迟、永不取消（测试用）
    pub fn immediate() -> Self {
        Self::new(DelaySection::zero(), CancellationToken::new())
    }

    pub fn delays(&self) -> &DelaySection {
        &self.delays
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 等待 duration；期间取消则返回 Cancelled。已取消时即使 duration 为 0 也返回 Cancelled
    pub async fn sleep(&self, duration: Duration) -> Result<(), AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
