//! # DataGate Core
//!
//! 数据采集与任务分发服务的核心模块：统一错误类型、任务信封与数据记录模型、
//! 配置加载与校验、以及存储/消息队列的端口定义。

pub mod config;
pub mod errors;
pub mod labels;
pub mod models;
pub mod traits;

pub use config::{
    ApiConfig, AppConfig, DatabaseConfig, MessageQueueConfig, MessageQueueType, RetryConfig,
    ServiceConfig, WorkerConfig,
};
pub use errors::{DataGateError, Result};
pub use models::{DataRecord, TaskDelivery, TaskEnvelope};
pub use traits::{DataStore, TaskQueue};
