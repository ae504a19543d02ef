use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use datagate_core::DataGateError;

/// API错误类型。
///
/// NotFound 与请求期存储错误严格区分：前者返回404，后者返回500并带上底层消息；
/// 两者都不会中断进程。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("记录不存在")]
    NotFound,

    #[error("存储错误: {0}")]
    Store(#[from] DataGateError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "记录不存在".to_string(),
                "NOT_FOUND",
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::Store(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                "STORE_ERROR",
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
