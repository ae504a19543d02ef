use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use datagate_core::{DataGateError, Result, TaskDelivery, TaskEnvelope, TaskQueue};

/// 内存消息队列实现。
///
/// 面向内嵌部署与测试场景，在进程内完整建模代理的预取约定：
/// 未确认投递数达到预取上限时，`next_delivery` 暂停下发；被拒绝的投递
/// 按 `requeue` 标记回到队首（带重投标记）或进入死信收集。
pub struct InMemoryTaskQueue {
    prefetch: u16,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, VecDeque<Pending>>,
    unacked: HashMap<u64, InFlight>,
    dead_letters: Vec<Vec<u8>>,
    next_tag: u64,
}

struct Pending {
    payload: Vec<u8>,
    redelivered: bool,
}

struct InFlight {
    queue: String,
    payload: Vec<u8>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::with_prefetch(1)
    }

    pub fn with_prefetch(prefetch: u16) -> Self {
        Self {
            prefetch,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// 直接投递原始字节负载（AMQP线上负载本就不透明，测试借此模拟损坏消息）
    pub async fn publish_raw(&self, queue: &str, payload: Vec<u8>) {
        let mut inner = self.inner.lock().await;
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(Pending {
                payload,
                redelivered: false,
            });
    }

    /// 当前未确认投递数
    pub async fn unacked_count(&self) -> u32 {
        self.inner.lock().await.unacked.len() as u32
    }

    /// 死信数量（被拒绝且不重新入队的投递）
    pub async fn dead_letter_count(&self) -> u32 {
        self.inner.lock().await.dead_letters.len() as u32
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn publish(&self, queue: &str, envelope: &TaskEnvelope) -> Result<()> {
        let payload = envelope
            .to_bytes()
            .map_err(|e| DataGateError::Serialization(format!("序列化任务信封失败: {e}")))?;

        let mut inner = self.inner.lock().await;
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(Pending {
                payload,
                redelivered: false,
            });

        debug!("消息已发布到内存队列 {}: task={}", queue, envelope.task);
        Ok(())
    }

    async fn next_delivery(&self, queue: &str) -> Result<Option<TaskDelivery>> {
        let mut inner = self.inner.lock().await;

        // 预取约定：在途投递达到上限时不再下发
        if inner.unacked.len() >= self.prefetch as usize {
            return Ok(None);
        }

        let Some(pending) = inner.queues.get_mut(queue).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };

        inner.next_tag += 1;
        let delivery_tag = inner.next_tag;
        inner.unacked.insert(
            delivery_tag,
            InFlight {
                queue: queue.to_string(),
                payload: pending.payload.clone(),
            },
        );

        Ok(Some(TaskDelivery {
            delivery_tag,
            payload: pending.payload,
            redelivered: pending.redelivered,
        }))
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .unacked
            .remove(&delivery_tag)
            .ok_or_else(|| DataGateError::MessageQueue(format!("未知投递标签: {delivery_tag}")))?;
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let in_flight = inner
            .unacked
            .remove(&delivery_tag)
            .ok_or_else(|| DataGateError::MessageQueue(format!("未知投递标签: {delivery_tag}")))?;

        if requeue {
            inner
                .queues
                .entry(in_flight.queue)
                .or_default()
                .push_front(Pending {
                    payload: in_flight.payload,
                    redelivered: true,
                });
        } else {
            inner.dead_letters.push(in_flight.payload);
        }
        Ok(())
    }

    async fn queue_depth(&self, queue: &str) -> Result<u32> {
        let inner = self.inner.lock().await;
        Ok(inner.queues.get(queue).map_or(0, |q| q.len() as u32))
    }
}
