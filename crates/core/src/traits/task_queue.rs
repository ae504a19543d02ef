use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{TaskDelivery, TaskEnvelope};

/// 消息队列端口。
///
/// 实现方持有独占的队列句柄并负责内部同步；投递遵循预取约定：
/// 未确认投递数达到预取上限时，`next_delivery` 不再下发新消息。
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 将任务信封以持久化模式发布到指定队列
    async fn publish(&self, queue: &str, envelope: &TaskEnvelope) -> Result<()>;

    /// 获取下一条投递；队列暂无可投递消息时返回 `None`
    async fn next_delivery(&self, queue: &str) -> Result<Option<TaskDelivery>>;

    /// 确认一条投递处理完成
    async fn ack(&self, delivery_tag: u64) -> Result<()>;

    /// 拒绝一条投递；`requeue` 决定重新入队还是进入死信路径
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()>;

    /// 队列中待投递的消息数量
    async fn queue_depth(&self, queue: &str) -> Result<u32>;
}
