//! API Module
//!
//! HTTP handlers and routing for the agent's control API.
//!
//! # Endpoints
//! - `GET /health`, `GET /status` - liveness and agent state
//! - `PUT /cache`, `GET|DELETE /cache/:key`, `GET /cache/:key/exists`, `DELETE /cache`
//! - `GET|POST|DELETE /queue`, `POST /queue/drain`
//! - `POST /connectivity` - manual link-state report
//! - `POST /prefetch` - warm the cache from upstream

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
