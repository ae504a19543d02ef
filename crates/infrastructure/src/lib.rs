//! # DataGate Infrastructure
//!
//! 核心端口的基础设施实现：带故障转移的PostgreSQL存储连接器、
//! RabbitMQ消息队列、内嵌部署用的内存队列、以及统一的连接重试工具。

pub mod in_memory_queue;
pub mod memory_store;
pub mod message_queue;
pub mod message_queue_factory;
pub mod retry;
pub mod store;

pub use in_memory_queue::InMemoryTaskQueue;
pub use memory_store::MemoryDataStore;
pub use message_queue::RabbitMqTaskQueue;
pub use message_queue_factory::create_task_queue;
pub use retry::connect_with_retry;
pub use store::{connect_store, PostgresDataStore};
