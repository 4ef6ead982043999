use axum::response::Json;
use serde_json::{json, Value};

/// Root endpoint: current server time as plain text
pub async fn root() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
