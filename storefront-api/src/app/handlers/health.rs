use axum::http::Uri;
use axum::Json;
use serde_json::json;

use super::super::error::ApiError;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// 未匹配的路由，记录可疑请求
pub async fn handler_404(uri: Uri) -> ApiError {
    tracing::warn!(path = %uri.path(), "route not found");
    ApiError::not_found("The requested resource does not exist")
}
