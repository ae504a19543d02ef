use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 数据集合中的一条记录。
///
/// `value` 是集合的业务主键；`name` 为常用字段单列；其余任意字段保存在
/// `attributes`（JSONB列）中并在 JSON 表示里平铺到顶层。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DataRecord {
    pub value: i64,
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: Value,
}

impl DataRecord {
    pub fn new(value: i64, name: Option<String>) -> Self {
        Self {
            value,
            name,
            attributes: Value::Object(serde_json::Map::new()),
        }
    }
}
