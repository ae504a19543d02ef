use std::sync::Arc;

use tracing::info;

use datagate_core::config::{MessageQueueConfig, MessageQueueType};
use datagate_core::{Result, TaskQueue};

use crate::{InMemoryTaskQueue, RabbitMqTaskQueue};

/// 按配置类型创建消息队列实现
pub async fn create_task_queue(config: &MessageQueueConfig) -> Result<Arc<dyn TaskQueue>> {
    match config.r#type {
        MessageQueueType::Rabbitmq => {
            info!("初始化RabbitMQ消息队列");
            let queue = RabbitMqTaskQueue::connect(config).await?;
            Ok(Arc::new(queue))
        }
        MessageQueueType::Memory => {
            info!("初始化内存消息队列");
            Ok(Arc::new(InMemoryTaskQueue::with_prefetch(
                config.prefetch_count,
            )))
        }
    }
}
