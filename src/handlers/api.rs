//! REST API handlers.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::state::AppState;

/// Health check endpoint.
///
/// Reports liveness plus the current session count, which doubles as a
/// cheap capacity signal for load balancers.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "sessions": state.manager.session_count(),
    }))
}
