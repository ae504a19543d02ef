use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{error, info, warn};

use datagate_core::{labels, TaskDelivery, TaskQueue};

use crate::audit::AuditLog;
use crate::processor::{ProcessOutcome, TaskProcessor};

/// Worker服务构建器
pub struct WorkerServiceBuilder {
    queue: Arc<dyn TaskQueue>,
    queue_name: String,
    processor: Arc<dyn TaskProcessor>,
    audit: AuditLog,
    instance: String,
    poll_interval_ms: u64,
}

impl WorkerServiceBuilder {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        queue_name: impl Into<String>,
        processor: Arc<dyn TaskProcessor>,
        audit: AuditLog,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            processor,
            audit,
            instance: hostname::get()
                .unwrap_or_else(|_| "unknown".into())
                .to_string_lossy()
                .to_string(),
            poll_interval_ms: 500,
        }
    }

    /// 设置进程实例标识
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    /// 设置空轮询间隔
    pub fn poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn build(self) -> WorkerService {
        WorkerService {
            queue: self.queue,
            queue_name: self.queue_name,
            processor: self.processor,
            audit: self.audit,
            instance: self.instance,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Worker服务：单消费者消息循环。
///
/// 并发上限由代理侧的预取约定保证：未确认投递不会超过预取值，
/// 因此单进程同一时刻至多处理一条消息，按到达顺序严格FIFO。
pub struct WorkerService {
    queue: Arc<dyn TaskQueue>,
    queue_name: String,
    processor: Arc<dyn TaskProcessor>,
    audit: AuditLog,
    instance: String,
    poll_interval: Duration,
}

impl WorkerService {
    pub fn builder(
        queue: Arc<dyn TaskQueue>,
        queue_name: impl Into<String>,
        processor: Arc<dyn TaskProcessor>,
        audit: AuditLog,
    ) -> WorkerServiceBuilder {
        WorkerServiceBuilder::new(queue, queue_name, processor, audit)
    }

    /// 运行消息循环，直到收到停止信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Worker服务已启动: instance={} queue={}",
            self.instance, self.queue_name
        );

        loop {
            tokio::select! {
                next = self.queue.next_delivery(&self.queue_name) => match next {
                    Ok(Some(delivery)) => self.handle_delivery(delivery).await,
                    Ok(None) => sleep(self.poll_interval).await,
                    Err(e) => {
                        error!("获取投递失败: {}", e);
                        sleep(self.poll_interval).await;
                    }
                },
                _ = shutdown_rx.recv() => {
                    info!("Worker收到停止信号");
                    break;
                }
            }
        }

        info!("Worker服务已停止: instance={}", self.instance);
    }

    async fn handle_delivery(&self, delivery: TaskDelivery) {
        let envelope = match delivery.envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                // 无法解析的负载没有重试意义，直接进入死信路径
                error!("消息负载解析失败，转入死信: {}", e);
                if let Err(e) = self.queue.nack(delivery.delivery_tag, false).await {
                    error!("死信投递拒绝失败: tag={} error={}", delivery.delivery_tag, e);
                }
                return;
            }
        };

        info!(
            "收到任务: task={} service={} instance={} redelivered={}",
            envelope.task, envelope.service, envelope.instance, delivery.redelivered
        );
        if !labels::is_known(&envelope.task) {
            warn!("任务标签不在约定词表中: {}", envelope.task);
        }

        if let Err(e) = self.audit.record_receipt(&envelope).await {
            error!("写入到达审计记录失败: {}", e);
        }

        let outcome = self.processor.process(&envelope).await;

        if let Err(e) = self.audit.record_completion(&envelope, outcome.as_str()).await {
            error!("写入完成审计记录失败: {}", e);
        }

        let result = match outcome {
            ProcessOutcome::Completed => self.queue.ack(delivery.delivery_tag).await,
            ProcessOutcome::Retry => self.queue.nack(delivery.delivery_tag, true).await,
            ProcessOutcome::Discard => self.queue.nack(delivery.delivery_tag, false).await,
        };
        if let Err(e) = result {
            error!(
                "投递确认失败: tag={} outcome={} error={}",
                delivery.delivery_tag,
                outcome.as_str(),
                e
            );
        }

        info!(
            "任务处理完成: task={} outcome={}",
            envelope.task,
            outcome.as_str()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEvent, AuditRecord};
    use crate::processor::SimulatedWorkProcessor;
    use async_trait::async_trait;
    use datagate_core::TaskEnvelope;
    use datagate_infrastructure::InMemoryTaskQueue;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    const QUEUE: &str = "task_queue";

    /// 第一次投递返回Retry，之后Completed
    struct FlakyProcessor {
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl TaskProcessor for FlakyProcessor {
        async fn process(&self, _envelope: &TaskEnvelope) -> ProcessOutcome {
            if self.failed_once.swap(true, Ordering::SeqCst) {
                ProcessOutcome::Completed
            } else {
                ProcessOutcome::Retry
            }
        }
    }

    struct DiscardingProcessor;

    #[async_trait]
    impl TaskProcessor for DiscardingProcessor {
        async fn process(&self, _envelope: &TaskEnvelope) -> ProcessOutcome {
            ProcessOutcome::Discard
        }
    }

    fn build_worker(
        queue: Arc<InMemoryTaskQueue>,
        processor: Arc<dyn TaskProcessor>,
        audit_path: &Path,
    ) -> Arc<WorkerService> {
        Arc::new(
            WorkerService::builder(
                queue as Arc<dyn TaskQueue>,
                QUEUE,
                processor,
                AuditLog::new(audit_path),
            )
            .instance("test-worker")
            .poll_interval_ms(5)
            .build(),
        )
    }

    async fn run_until<F, Fut>(worker: Arc<WorkerService>, condition: F)
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run(shutdown_rx).await })
        };

        for _ in 0..400 {
            if condition().await {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(condition().await, "等待条件超时");

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    fn read_audit(path: &Path) -> Vec<AuditRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_end_to_end_update_task() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.log");
        let queue = Arc::new(InMemoryTaskQueue::new());

        let mut extra = serde_json::Map::new();
        extra.insert("value".to_string(), json!(42));
        extra.insert("updates".to_string(), json!({"name": "x"}));
        let envelope = TaskEnvelope::new("update", "update-svc", "node-09").with_extra(extra);
        queue.publish(QUEUE, &envelope).await.unwrap();

        let worker = build_worker(
            Arc::clone(&queue),
            Arc::new(SimulatedWorkProcessor::new(Duration::from_millis(10))),
            &audit_path,
        );
        run_until(worker, || {
            let queue = Arc::clone(&queue);
            async move {
                queue.queue_depth(QUEUE).await.unwrap() == 0 && queue.unacked_count().await == 0
            }
        })
        .await;

        // 处理完毕后队列中没有未确认消息
        assert_eq!(queue.unacked_count().await, 0);
        assert_eq!(queue.dead_letter_count().await, 0);

        let records = read_audit(&audit_path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, AuditEvent::Received);
        assert_eq!(records[0].task, "update");
        assert_eq!(records[0].service, "update-svc");
        assert_eq!(records[0].instance, "node-09");
        assert_eq!(records[1].event, AuditEvent::Completed);
        assert_eq!(records[1].outcome.as_deref(), Some("completed"));
        assert!(records[1].timestamp >= records[0].timestamp);
    }

    #[tokio::test]
    async fn test_retry_outcome_requeues_then_completes() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.log");
        let queue = Arc::new(InMemoryTaskQueue::new());

        let envelope = TaskEnvelope::new("getone", "getone-svc", "node-01");
        queue.publish(QUEUE, &envelope).await.unwrap();

        let worker = build_worker(
            Arc::clone(&queue),
            Arc::new(FlakyProcessor {
                failed_once: AtomicBool::new(false),
            }),
            &audit_path,
        );
        run_until(worker, || {
            let queue = Arc::clone(&queue);
            async move {
                queue.queue_depth(QUEUE).await.unwrap() == 0 && queue.unacked_count().await == 0
            }
        })
        .await;

        assert_eq!(queue.dead_letter_count().await, 0);

        // 第一轮Retry + 第二轮Completed，各有一对审计记录
        let records = read_audit(&audit_path);
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].outcome.as_deref(), Some("retry"));
        assert_eq!(records[3].outcome.as_deref(), Some("completed"));
    }

    #[tokio::test]
    async fn test_discard_outcome_dead_letters() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.log");
        let queue = Arc::new(InMemoryTaskQueue::new());

        let envelope = TaskEnvelope::new("post-call", "backend", "node-02");
        queue.publish(QUEUE, &envelope).await.unwrap();

        let worker = build_worker(Arc::clone(&queue), Arc::new(DiscardingProcessor), &audit_path);
        run_until(worker, || {
            let queue = Arc::clone(&queue);
            async move { queue.dead_letter_count().await == 1 }
        })
        .await;

        let records = read_audit(&audit_path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].outcome.as_deref(), Some("discard"));
    }

    #[tokio::test]
    async fn test_poison_payload_goes_to_dead_letters_without_audit() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.log");
        let queue = Arc::new(InMemoryTaskQueue::new());

        queue.publish_raw(QUEUE, b"not-json".to_vec()).await;

        let worker = build_worker(
            Arc::clone(&queue),
            Arc::new(SimulatedWorkProcessor::new(Duration::from_millis(1))),
            &audit_path,
        );
        run_until(worker, || {
            let queue = Arc::clone(&queue);
            async move { queue.dead_letter_count().await == 1 }
        })
        .await;

        // 解析失败的消息不产生审计记录
        assert!(!audit_path.exists());
    }

    #[tokio::test]
    async fn test_fifo_processing_order() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.log");
        let queue = Arc::new(InMemoryTaskQueue::new());

        for task in ["getall", "getone", "update"] {
            let envelope = TaskEnvelope::new(task, "svc", "node");
            queue.publish(QUEUE, &envelope).await.unwrap();
        }

        let worker = build_worker(
            Arc::clone(&queue),
            Arc::new(SimulatedWorkProcessor::new(Duration::from_millis(1))),
            &audit_path,
        );
        run_until(worker, || {
            let queue = Arc::clone(&queue);
            async move {
                queue.queue_depth(QUEUE).await.unwrap() == 0 && queue.unacked_count().await == 0
            }
        })
        .await;

        let tasks: Vec<String> = read_audit(&audit_path)
            .into_iter()
            .filter(|r| r.event == AuditEvent::Received)
            .map(|r| r.task)
            .collect();
        assert_eq!(tasks, vec!["getall", "getone", "update"]);
    }
}
