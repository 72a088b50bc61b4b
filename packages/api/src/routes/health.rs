use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// Liveness plus broker connection state. Always 200.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let broker = if state.broker().is_connected() {
        "connected"
    } else {
        "disconnected"
    };
    Json(json!({ "status": "ok", "broker": broker }))
}
