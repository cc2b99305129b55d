//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::models::requests::validate_key;
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, InvalidateRequest,
    InvalidateResponse, KeysResponse, SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// `Cache` is already a shared handle with its own synchronization.
#[derive(Clone)]
pub struct AppState {
    pub cache: Cache,
}

impl AppState {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let options = req.options();
    if !state.cache.set_value(&req.key, req.value, options).await {
        return Err(CacheError::Backend(format!(
            "Key '{}' could not be stored",
            req.key
        )));
    }

    let tags = state.cache.tags_for(&req.key);
    Ok(Json(SetResponse::new(req.key, tags)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    match state.cache.get_value(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    if state.cache.delete(&key).await {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let deleted = state.cache.invalidate_by_tags(&req.tags).await;
    Ok(Json(InvalidateResponse {
        tags: req.tags,
        deleted,
    }))
}

/// Handler for GET /keys
pub async fn keys_handler(State(state): State<AppState>) -> Json<KeysResponse> {
    Json(KeysResponse::new(state.cache.keys().await))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear().await;
    Json(ClearResponse {
        message: "Cache cleared".to_string(),
    })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = &state.cache;
    let size = cache.size().await;
    let stats = cache.stats().await;

    Json(StatsResponse::new(
        cache.backend_name(),
        stats,
        size,
        cache.tag_count(),
    ))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.backend_name()))
}
