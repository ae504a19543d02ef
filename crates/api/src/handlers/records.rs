use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};

use datagate_core::{labels, DataRecord};

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

/// 列出集合内全部记录
pub async fn list_records(State(state): State<AppState>) -> ApiResult<Json<Vec<DataRecord>>> {
    // 先分发任务再执行存储操作：存储结果不影响任务入队
    state.dispatcher.dispatch(labels::GET_ALL, Map::new()).await;

    let records = state.store.list().await?;
    Ok(Json(records))
}

/// 按键读取单条记录
pub async fn get_record(
    State(state): State<AppState>,
    Path(value): Path<i64>,
) -> ApiResult<Json<DataRecord>> {
    let mut extra = Map::new();
    extra.insert("value".to_string(), json!(value));
    state.dispatcher.dispatch(labels::GET_ONE, extra).await;

    let record = state.store.get(value).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(record))
}

/// 插入一条新记录
pub async fn create_record(
    State(state): State<AppState>,
    Json(record): Json<DataRecord>,
) -> ApiResult<(StatusCode, Json<DataRecord>)> {
    let mut extra = Map::new();
    extra.insert("value".to_string(), json!(record.value));
    state.dispatcher.dispatch(labels::POST_CALL, extra).await;

    let created = state.store.insert(&record).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// 按键做字段级更新
pub async fn update_record(
    State(state): State<AppState>,
    Path(value): Path<i64>,
    Json(updates): Json<Map<String, Value>>,
) -> ApiResult<Json<DataRecord>> {
    let mut extra = Map::new();
    extra.insert("value".to_string(), json!(value));
    extra.insert("updates".to_string(), Value::Object(updates.clone()));
    state.dispatcher.dispatch(labels::UPDATE, extra).await;

    let updated = state
        .store
        .update(value, &updates)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}
