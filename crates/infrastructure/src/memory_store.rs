use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use datagate_core::{DataGateError, DataRecord, DataStore, Result};

/// 内存数据存储实现，面向内嵌部署与测试场景。
/// 与PostgreSQL实现保持同一套字段级语义：`name` 单列更新，其余键合并。
#[derive(Default)]
pub struct MemoryDataStore {
    records: RwLock<BTreeMap<i64, DataRecord>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn merge_attributes(target: &mut Value, incoming: &Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Some(object) = target.as_object_mut() {
        for (key, value) in incoming {
            object.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn list(&self) -> Result<Vec<DataRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }

    async fn get(&self, value: i64) -> Result<Option<DataRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&value).cloned())
    }

    async fn insert(&self, record: &DataRecord) -> Result<DataRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.value) {
            return Err(DataGateError::Internal(format!(
                "记录已存在: value={}",
                record.value
            )));
        }
        records.insert(record.value, record.clone());
        Ok(record.clone())
    }

    async fn update(&self, value: i64, changes: &Map<String, Value>) -> Result<Option<DataRecord>> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&value) else {
            return Ok(None);
        };

        for (key, incoming) in changes {
            if key == "name" {
                record.name = incoming.as_str().map(|s| s.to_string());
            }
        }
        let rest: Map<String, Value> = changes
            .iter()
            .filter(|(key, _)| key.as_str() != "name")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        merge_attributes(&mut record.attributes, &rest);

        Ok(Some(record.clone()))
    }
}
