//! Health and readiness handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// Liveness: the process is up
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": citeguard_common::VERSION,
    }))
}

/// Readiness: the index is usable
pub async fn ready(State(state): State<AppState>) -> Json<Value> {
    let stats = state.service.index_stats().await;
    Json(json!({
        "status": if stats.corrupted { "degraded" } else { "ok" },
        "index": stats,
    }))
}
