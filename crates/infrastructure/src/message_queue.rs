use futures::StreamExt;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Consumer, Queue,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use datagate_core::config::MessageQueueConfig;
use datagate_core::{DataGateError, Result, TaskDelivery, TaskEnvelope, TaskQueue};

use crate::retry::connect_with_retry;

/// RabbitMQ消息队列实现
///
/// 句柄由创建它的进程独占；连接与通道在启动时建立一次，启动后不自动重建。
pub struct RabbitMqTaskQueue {
    _connection: Connection,
    channel: Mutex<Channel>,
    consumer: Mutex<Option<Consumer>>,
    config: MessageQueueConfig,
}

impl RabbitMqTaskQueue {
    /// 按重试策略建立连接、创建通道并声明持久化任务队列
    pub async fn connect(config: &MessageQueueConfig) -> Result<Self> {
        let policy = config.retry();
        let cfg = config.clone();

        let (connection, channel) = connect_with_retry("消息队列", &policy, move |_| {
            let cfg = cfg.clone();
            async move {
                let connection = Connection::connect(&cfg.url, ConnectionProperties::default())
                    .await
                    .map_err(|e| DataGateError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

                let channel = connection
                    .create_channel()
                    .await
                    .map_err(|e| DataGateError::MessageQueue(format!("创建通道失败: {e}")))?;

                declare_queue(&channel, &cfg.task_queue, true).await?;
                Ok((connection, channel))
            }
        })
        .await?;

        info!("成功连接到RabbitMQ，队列 {} 已声明", config.task_queue);

        Ok(Self {
            _connection: connection,
            channel: Mutex::new(channel),
            consumer: Mutex::new(None),
            config: config.clone(),
        })
    }

    /// 创建消费者：先设置预取上限，再以手动确认模式订阅队列
    async fn create_consumer(&self, queue: &str) -> Result<Consumer> {
        let channel = self.channel.lock().await;

        channel
            .basic_qos(self.config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| DataGateError::MessageQueue(format!("设置预取上限失败: {e}")))?;

        let consumer = channel
            .basic_consume(
                queue,
                "datagate-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| DataGateError::MessageQueue(format!("创建消费者失败: {e}")))?;

        debug!(
            "为队列 {} 创建消费者 (prefetch={})",
            queue, self.config.prefetch_count
        );
        Ok(consumer)
    }
}

/// 声明队列
async fn declare_queue(channel: &Channel, queue_name: &str, durable: bool) -> Result<Queue> {
    let queue = channel
        .queue_declare(
            queue_name,
            QueueDeclareOptions {
                durable,
                exclusive: false,
                auto_delete: false,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| DataGateError::MessageQueue(format!("声明队列 {queue_name} 失败: {e}")))?;

    debug!("队列 {} 声明成功 (durable={})", queue_name, durable);
    Ok(queue)
}

#[async_trait::async_trait]
impl TaskQueue for RabbitMqTaskQueue {
    async fn publish(&self, queue: &str, envelope: &TaskEnvelope) -> Result<()> {
        let payload = envelope
            .to_bytes()
            .map_err(|e| DataGateError::Serialization(format!("序列化任务信封失败: {e}")))?;

        let channel = self.channel.lock().await;
        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2), // 2 = persistent
            )
            .await
            .map_err(|e| DataGateError::MessageQueue(format!("发布消息到队列 {queue} 失败: {e}")))?;

        confirm
            .await
            .map_err(|e| DataGateError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        debug!("消息已发布到队列 {}: task={}", queue, envelope.task);
        Ok(())
    }

    async fn next_delivery(&self, queue: &str) -> Result<Option<TaskDelivery>> {
        let mut guard = self.consumer.lock().await;
        if guard.is_none() {
            *guard = Some(self.create_consumer(queue).await?);
        }
        let Some(consumer) = guard.as_mut() else {
            return Err(DataGateError::Internal("消费者未初始化".to_string()));
        };

        match consumer.next().await {
            Some(Ok(delivery)) => Ok(Some(TaskDelivery {
                delivery_tag: delivery.delivery_tag,
                payload: delivery.data,
                redelivered: delivery.redelivered,
            })),
            Some(Err(e)) => Err(DataGateError::MessageQueue(format!("接收投递失败: {e}"))),
            // 流结束意味着通道已关闭
            None => Ok(None),
        }
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        let channel = self.channel.lock().await;
        channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| DataGateError::MessageQueue(format!("确认消息失败: {e}")))?;
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let channel = self.channel.lock().await;
        channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| DataGateError::MessageQueue(format!("拒绝消息失败: {e}")))?;
        Ok(())
    }

    async fn queue_depth(&self, queue: &str) -> Result<u32> {
        let channel = self.channel.lock().await;
        let queue_info = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;

        match queue_info {
            Ok(info) => Ok(info.message_count()),
            Err(e) => {
                // 队列不存在时返回0而不是错误
                let error_msg = e.to_string();
                if error_msg.contains("NOT_FOUND") || error_msg.contains("404") {
                    debug!("队列 {} 不存在，返回深度0", queue);
                    Ok(0)
                } else {
                    Err(DataGateError::MessageQueue(format!(
                        "获取队列 {queue} 信息失败: {e}"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::config::MessageQueueType;

    #[tokio::test]
    async fn test_connect_exhausts_unreachable_broker() {
        let config = MessageQueueConfig {
            r#type: MessageQueueType::Rabbitmq,
            // 保留端口，保证快速拒绝连接
            url: "amqp://127.0.0.1:1".to_string(),
            task_queue: "task_queue".to_string(),
            prefetch_count: 1,
            max_attempts: 2,
            retry_delay_ms: 0,
        };

        let result = RabbitMqTaskQueue::connect(&config).await;
        assert!(matches!(
            result,
            Err(DataGateError::ConnectionExhausted { attempts: 2, .. })
        ));
    }
}
