use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::models::DataRecord;

/// 数据存储端口：字段级的集合读写。
#[async_trait]
pub trait DataStore: Send + Sync {
    /// 列出集合内全部记录
    async fn list(&self) -> Result<Vec<DataRecord>>;

    /// 按业务主键读取单条记录
    async fn get(&self, value: i64) -> Result<Option<DataRecord>>;

    /// 插入一条新记录
    async fn insert(&self, record: &DataRecord) -> Result<DataRecord>;

    /// 字段级更新：`changes` 中的 `name` 更新单列，其余键合并进 attributes。
    /// 记录不存在时返回 `None`。
    async fn update(&self, value: i64, changes: &Map<String, Value>) -> Result<Option<DataRecord>>;
}
