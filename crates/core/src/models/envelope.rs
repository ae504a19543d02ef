use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 任务信封：队列上传输的消息体。
///
/// `task` 为任务标签（必填且非空），`service`/`instance` 标识生产方组件与进程，
/// `timestamp` 在发布时刻写入。调用方附加的字段通过 `extra` 平铺进 JSON 顶层，
/// 序列化后与各服务的历史消息格式保持兼容。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: String,
    pub service: String,
    pub instance: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskEnvelope {
    /// 创建信封，时间戳取当前时刻
    pub fn new(task: impl Into<String>, service: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            service: service.into(),
            instance: instance.into(),
            timestamp: Utc::now(),
            extra: Map::new(),
        }
    }

    /// 附加调用方提供的扩展字段
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// 投递给消费者的消息：不透明字节负载、用于确认的投递标签、重投标记。
#[derive(Debug, Clone)]
pub struct TaskDelivery {
    pub delivery_tag: u64,
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

impl TaskDelivery {
    /// 将负载解析为任务信封
    pub fn envelope(&self) -> Result<TaskEnvelope, serde_json::Error> {
        TaskEnvelope::from_bytes(&self.payload)
    }
}
