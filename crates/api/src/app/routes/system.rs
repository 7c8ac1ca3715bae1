use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::errors::ApiError;

pub async fn check() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Server is running!",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
