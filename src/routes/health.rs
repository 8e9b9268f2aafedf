//! GET /       - Liveness string
//! GET /health - Liveness as JSON

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

pub const LIVENESS_MESSAGE: &str = "Booking payments backend is running";

pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> &'static str {
    LIVENESS_MESSAGE
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
