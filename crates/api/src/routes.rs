use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use datagate_core::DataStore;
use datagate_dispatcher::TaskDispatcher;

use crate::handlers::{
    health::health_check,
    records::{create_record, get_record, list_records, update_record},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub dispatcher: Arc<TaskDispatcher>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查（就绪信号：两个连接器完成后才会建出本路由）
        .route("/health", get(health_check))
        // 数据集合API
        .route("/api/testdata", get(list_records).post(create_record))
        .route("/api/testdata/{value}", get(get_record))
        .route("/api/testdata/update/{value}", post(update_record))
        .with_state(state)
}
