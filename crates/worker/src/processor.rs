use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use datagate_core::TaskEnvelope;

/// 单条消息的处理结果：确认、重投还是死信由处理器显式决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 处理成功，确认投递
    Completed,
    /// 处理失败但可重试，重新入队
    Retry,
    /// 处理失败且不可重试，进入死信路径
    Discard,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Completed => "completed",
            ProcessOutcome::Retry => "retry",
            ProcessOutcome::Discard => "discard",
        }
    }
}

/// 任务处理器端口
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, envelope: &TaskEnvelope) -> ProcessOutcome;
}

/// 模拟固定工作单元的处理器：睡眠有界延时后完成。
pub struct SimulatedWorkProcessor {
    work_delay: Duration,
}

impl SimulatedWorkProcessor {
    pub fn new(work_delay: Duration) -> Self {
        Self { work_delay }
    }
}

#[async_trait]
impl TaskProcessor for SimulatedWorkProcessor {
    async fn process(&self, envelope: &TaskEnvelope) -> ProcessOutcome {
        debug!("模拟处理任务: task={}", envelope.task);
        sleep(self.work_delay).await;
        ProcessOutcome::Completed
    }
}
