//! API Handlers
//!
//! HTTP request handlers for each control API endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::{Result, SyncError};
use crate::manager::{OfflineManager, PrefetchReport};
use crate::models::{
    CacheValueResponse, ClearCacheQuery, ClearResponse, ConnectivityRequest, ConnectivityResponse,
    DeleteResponse, EnqueueRequest, EnqueueResponse, ExistsResponse, HealthResponse,
    PrefetchRequest, PutCacheRequest, PutCacheResponse, QueueResponse, StatusResponse,
};
use crate::queue::DrainReport;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<OfflineManager>,
}

impl AppState {
    pub fn new(manager: OfflineManager) -> Self {
        Self::from_shared(Arc::new(manager))
    }

    pub fn from_shared(manager: Arc<OfflineManager>) -> Self {
        Self { manager }
    }
}

// == Cache ==

/// Handler for PUT /cache
pub async fn put_cache_handler(
    State(state): State<AppState>,
    Json(req): Json<PutCacheRequest>,
) -> Result<Json<PutCacheResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(SyncError::InvalidRequest(error_msg));
    }

    let options = req.options();
    let mut cache = state.manager.cache().write().await;
    let outcome = cache.put(&req.key, req.value, options).await?;
    let entry = cache
        .peek(&req.key)
        .ok_or_else(|| SyncError::NotFound(req.key.clone()))?;

    Ok(Json(PutCacheResponse::new(entry, outcome.evicted)))
}

/// Handler for GET /cache/:key
pub async fn get_cache_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CacheValueResponse>> {
    // Write lock: reads update stats and may drop an expired entry
    let mut cache = state.manager.cache().write().await;
    let value = cache
        .get(&key)
        .await
        .ok_or_else(|| SyncError::NotFound(key.clone()))?;

    Ok(Json(CacheValueResponse::new(key, value)))
}

/// Handler for GET /cache/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ExistsResponse> {
    let exists = state.manager.cache().write().await.has(&key).await;
    Json(ExistsResponse { key, exists })
}

/// Handler for DELETE /cache/:key
pub async fn delete_cache_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.manager.cache().write().await.remove(&key).await;
    if !removed {
        return Err(SyncError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /cache
///
/// `?pattern=<regex>` limits the clear to matching keys.
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Query(query): Query<ClearCacheQuery>,
) -> Result<Json<ClearResponse>> {
    let pattern = query.regex().map_err(SyncError::InvalidRequest)?;

    let mut cache = state.manager.cache().write().await;
    let cleared = match pattern {
        Some(pattern) => cache.remove_matching(&pattern).await,
        None => {
            let cleared = cache.len();
            cache.clear().await;
            cleared
        }
    };

    Ok(Json(ClearResponse::new("cache entries", cleared)))
}

// == Queue ==

/// Handler for GET /queue
pub async fn list_queue_handler(State(state): State<AppState>) -> Json<QueueResponse> {
    let queue = state.manager.queue();
    let operations = queue.pending().await;

    Json(QueueResponse {
        length: operations.len(),
        draining: queue.is_draining(),
        operations,
    })
}

/// Handler for POST /queue
pub async fn enqueue_handler(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(SyncError::InvalidRequest(error_msg));
    }

    let queue = state.manager.queue();
    let id = queue.enqueue(req.into_operation()).await;

    Ok(Json(EnqueueResponse {
        id,
        queue_length: queue.size().await,
    }))
}

/// Handler for POST /queue/drain
pub async fn drain_handler(State(state): State<AppState>) -> Json<DrainReport> {
    Json(state.manager.queue().drain().await)
}

/// Handler for DELETE /queue
pub async fn clear_queue_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let queue = state.manager.queue();
    let cleared = queue.size().await;
    queue.clear().await;

    Json(ClearResponse::new("operations", cleared))
}

// == Connectivity ==

/// Handler for POST /connectivity
///
/// Lets the host report link state manually, e.g. when no probe is
/// configured.
pub async fn connectivity_handler(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> Result<Json<ConnectivityResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(SyncError::InvalidRequest(error_msg));
    }
    let quality = req
        .quality()
        .ok_or_else(|| SyncError::InvalidRequest("Missing connectivity state".to_string()))?;

    let monitor = state.manager.connectivity();
    let changed = monitor.update(quality);

    Ok(Json(ConnectivityResponse {
        is_online: monitor.is_online(),
        quality: monitor.quality(),
        changed,
    }))
}

// == Prefetch ==

/// Handler for POST /prefetch
pub async fn prefetch_handler(
    State(state): State<AppState>,
    Json(req): Json<PrefetchRequest>,
) -> Result<Json<PrefetchReport>> {
    if let Some(error_msg) = req.validate() {
        return Err(SyncError::InvalidRequest(error_msg));
    }

    Ok(Json(state.manager.prefetch(&req.keys).await))
}

// == Status ==

/// Handler for GET /status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.manager.status().await;
    let stats = state.manager.cache().read().await.stats();

    Json(StatusResponse::new(status, stats))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
