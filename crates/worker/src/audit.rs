use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use datagate_core::{DataGateError, Result, TaskEnvelope};

/// 审计事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Received,
    Completed,
}

/// 一条审计记录：收到与完成各记一条，携带任务标签、生产方服务与实例。
#[derive(Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event: AuditEvent,
    pub task: String,
    pub service: String,
    pub instance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// 本地审计日志：追加写、一行一条JSON记录。
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 记录消息到达
    pub async fn record_receipt(&self, envelope: &TaskEnvelope) -> Result<()> {
        self.append(AuditRecord {
            event: AuditEvent::Received,
            task: envelope.task.clone(),
            service: envelope.service.clone(),
            instance: envelope.instance.clone(),
            outcome: None,
            timestamp: Utc::now(),
        })
        .await
    }

    /// 记录处理完成及其结果
    pub async fn record_completion(&self, envelope: &TaskEnvelope, outcome: &str) -> Result<()> {
        self.append(AuditRecord {
            event: AuditEvent::Completed,
            task: envelope.task.clone(),
            service: envelope.service.clone(),
            instance: envelope.instance.clone(),
            outcome: Some(outcome.to_string()),
            timestamp: Utc::now(),
        })
        .await
    }

    async fn append(&self, record: AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| DataGateError::Serialization(format!("序列化审计记录失败: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DataGateError::Internal(format!("打开审计日志失败: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DataGateError::Internal(format!("写入审计日志失败: {e}")))?;
        file.flush()
            .await
            .map_err(|e| DataGateError::Internal(format!("刷新审计日志失败: {e}")))?;
        Ok(())
    }
}
