//! Admin handlers
//!
//! Thin wrappers over the service's admin operations. Authentication for
//! this surface is deployment glue (reverse proxy) and not handled here.

use crate::AppState;
use axum::{extract::State, Json};
use citeguard_common::errors::Result;
use citeguard_engine::service::DeduplicationStats;
use citeguard_index::IndexStats;
use serde_json::{json, Value};

/// Persist the index now (bypasses the debounce window)
pub async fn save(State(state): State<AppState>) -> Result<Json<Value>> {
    state.service.save().await?;
    Ok(Json(json!({"saved": true})))
}

/// Empty the index; paper ids keep their monotonicity
pub async fn clear(State(state): State<AppState>) -> Result<Json<Value>> {
    state.service.clear().await?;
    Ok(Json(json!({"cleared": true})))
}

/// Copy the persisted files into a stamped backup directory
pub async fn backup(State(state): State<AppState>) -> Result<Json<Value>> {
    let path = state.service.backup().await?;
    Ok(Json(json!({"backup_path": path})))
}

/// Drop papers sharing a content hash, keeping the lowest paper id
pub async fn remove_duplicates(State(state): State<AppState>) -> Result<Json<Value>> {
    let removed = state.service.remove_duplicates().await?;
    Ok(Json(json!({"removed": removed})))
}

/// Refill every rate bucket and close every circuit
pub async fn reset_limits(State(state): State<AppState>) -> Result<Json<Value>> {
    state.service.reset_limits().await?;
    Ok(Json(json!({"reset": true})))
}

/// Evict all cached result sets
pub async fn clear_result_cache(State(state): State<AppState>) -> Result<Json<Value>> {
    let evicted = state.service.clear_result_cache().await;
    Ok(Json(json!({"evicted": evicted})))
}

/// Dedup ledger and index statistics
pub async fn deduplication_stats(State(state): State<AppState>) -> Result<Json<DeduplicationStats>> {
    Ok(Json(state.service.deduplication_stats().await?))
}

/// Index statistics
pub async fn index_stats(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.service.index_stats().await)
}
