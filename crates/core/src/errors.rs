use thiserror::Error;

/// 服务统一错误类型定义
#[derive(Debug, Error)]
pub enum DataGateError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("连接 {target} 失败，已耗尽 {attempts} 次重试")]
    ConnectionExhausted { target: String, attempts: u32 },

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, DataGateError>;
