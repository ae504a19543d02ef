use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use datagate_core::{TaskEnvelope, TaskQueue};

/// 单次发布的结果。
///
/// 发布对请求正确性而言是尽力而为：三种结果都不向HTTP调用方抛出，
/// 但调用方与测试可以借此区分"队列尚未就绪"与"代理拒绝"。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 代理已接受并持久化
    Published,
    /// 队列句柄尚未建立，本次发布按无操作处理
    Skipped,
    /// 队列已连接但发布失败
    Failed,
}

/// 任务分发器。
///
/// 持有构造时注入的队列句柄与服务身份；句柄生命周期为 init → ready，
/// 启动后不再重建。每次 `dispatch` 构造一个新的任务信封，时间戳取发布时刻。
pub struct TaskDispatcher {
    queue: Option<Arc<dyn TaskQueue>>,
    queue_name: String,
    service: String,
    instance: String,
}

impl TaskDispatcher {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        queue_name: impl Into<String>,
        service: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            queue: Some(queue),
            queue_name: queue_name.into(),
            service: service.into(),
            instance: instance.into(),
        }
    }

    /// 创建未接入队列的分发器：所有发布按 `Skipped` 处理
    pub fn detached(
        queue_name: impl Into<String>,
        service: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            queue: None,
            queue_name: queue_name.into(),
            service: service.into(),
            instance: instance.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// 构造任务信封并发布。永不阻塞调用方的主数据操作，也永不向其抛错。
    pub async fn dispatch(&self, task: &str, extra: Map<String, Value>) -> PublishOutcome {
        if task.is_empty() {
            error!("任务标签为空，拒绝发布");
            return PublishOutcome::Failed;
        }

        let Some(queue) = &self.queue else {
            debug!("队列尚未就绪，跳过任务发布: task={}", task);
            return PublishOutcome::Skipped;
        };

        let envelope =
            TaskEnvelope::new(task, self.service.clone(), self.instance.clone()).with_extra(extra);

        match queue.publish(&self.queue_name, &envelope).await {
            Ok(()) => {
                info!(
                    "任务已入队: task={} service={} instance={}",
                    envelope.task, envelope.service, envelope.instance
                );
                PublishOutcome::Published
            }
            Err(e) => {
                error!("任务发布失败: task={} error={}", task, e);
                PublishOutcome::Failed
            }
        }
    }
}
