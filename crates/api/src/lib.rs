//! # DataGate API
//!
//! 数据集合的REST接口，基于Axum构建。
//!
//! ## API 端点
//!
//! - `GET  /health` - 健康检查（返回实例标识）
//! - `GET  /api/testdata` - 获取全部记录
//! - `POST /api/testdata` - 创建记录
//! - `GET  /api/testdata/{value}` - 按键获取单条记录
//! - `POST /api/testdata/update/{value}` - 按键做字段级更新
//!
//! 每个集合端点都会先通过 [`datagate_dispatcher::TaskDispatcher`] 发布对应的
//! 任务标签（`getall` / `getone` / `post-call` / `update`），随后才执行存储
//! 操作；发布是尽力而为的，其结果不影响HTTP响应。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;

use datagate_core::DataStore;
use datagate_dispatcher::TaskDispatcher;
use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(store: Arc<dyn DataStore>, dispatcher: Arc<TaskDispatcher>) -> Router {
    let state = AppState { store, dispatcher };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
