//! API Routes
//!
//! Configures the Axum router with all control API endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_cache_handler, clear_queue_handler, connectivity_handler, delete_cache_handler,
    drain_handler, enqueue_handler, exists_handler, get_cache_handler, health_handler,
    list_queue_handler, prefetch_handler, put_cache_handler, status_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// Cache keys are path segments; keys containing `/` must be
/// percent-encoded (`/cache/%2Fapi%2Fitems`).
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/cache", put(put_cache_handler).delete(clear_cache_handler))
        .route("/cache/:key", get(get_cache_handler).delete(delete_cache_handler))
        .route("/cache/:key/exists", get(exists_handler))
        .route(
            "/queue",
            get(list_queue_handler)
                .post(enqueue_handler)
                .delete(clear_queue_handler),
        )
        .route("/queue/drain", post(drain_handler))
        .route("/connectivity", post(connectivity_handler))
        .route("/prefetch", post(prefetch_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
