use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use datagate_core::config::DatabaseConfig;
use datagate_core::{DataRecord, DataStore, Result};

use crate::retry::{connect_with_retry, first_reachable};

/// 连接数据存储：每轮按配置顺序遍历候选主机，首个成功者即为进程生命期内的
/// 活动连接池；一轮内不回头重试更靠前的主机。整轮失败后按策略睡眠再进入下一轮。
pub async fn connect_store(config: &DatabaseConfig) -> Result<PgPool> {
    let policy = config.retry();
    let cfg = config.clone();

    connect_with_retry("数据库", &policy, move |attempt| {
        let cfg = cfg.clone();
        async move {
            first_reachable(&cfg.hosts, |host| {
                let cfg = cfg.clone();
                let host = host.to_string();
                async move {
                    match try_connect_host(&cfg, &host).await {
                        Ok(pool) => {
                            info!(host = %host, attempt, "数据库主机连接成功");
                            Ok(pool)
                        }
                        Err(e) => {
                            warn!(host = %host, attempt, "数据库主机连接失败: {}", e);
                            Err(e)
                        }
                    }
                }
            })
            .await
        }
    })
    .await
}

async fn try_connect_host(config: &DatabaseConfig, host: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect(&config.url_for_host(host))
        .await?;
    Ok(pool)
}

/// PostgreSQL数据存储实现
pub struct PostgresDataStore {
    pool: PgPool,
}

impl PostgresDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 拆分字段级更新：`name` 键更新单列，其余键合并进 attributes
pub(crate) fn split_changes(changes: &Map<String, Value>) -> (Option<String>, Value) {
    let mut rest = Map::new();
    let mut name = None;
    for (key, value) in changes {
        if key == "name" {
            name = value.as_str().map(|s| s.to_string());
        } else {
            rest.insert(key.clone(), value.clone());
        }
    }
    (name, Value::Object(rest))
}

#[async_trait]
impl DataStore for PostgresDataStore {
    async fn list(&self) -> Result<Vec<DataRecord>> {
        let records = sqlx::query_as::<_, DataRecord>(
            "SELECT value, name, attributes FROM test_data ORDER BY value",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn get(&self, value: i64) -> Result<Option<DataRecord>> {
        let record = sqlx::query_as::<_, DataRecord>(
            "SELECT value, name, attributes FROM test_data WHERE value = $1",
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert(&self, record: &DataRecord) -> Result<DataRecord> {
        let inserted = sqlx::query_as::<_, DataRecord>(
            "INSERT INTO test_data (value, name, attributes) VALUES ($1, $2, $3) \
             RETURNING value, name, attributes",
        )
        .bind(record.value)
        .bind(&record.name)
        .bind(&record.attributes)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn update(&self, value: i64, changes: &Map<String, Value>) -> Result<Option<DataRecord>> {
        let (name, attributes) = split_changes(changes);
        let updated = sqlx::query_as::<_, DataRecord>(
            "UPDATE test_data SET name = COALESCE($2, name), attributes = attributes || $3 \
             WHERE value = $1 RETURNING value, name, attributes",
        )
        .bind(value)
        .bind(name)
        .bind(attributes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }
}
