//! Request and Response models for the control API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    ClearCacheQuery, ConnectivityRequest, EnqueueRequest, PrefetchRequest, PutCacheRequest,
};
pub use responses::{
    CacheValueResponse, ClearResponse, ConnectivityResponse, DeleteResponse, EnqueueResponse,
    ExistsResponse, HealthResponse, PutCacheResponse, QueueResponse, StatusResponse,
};
