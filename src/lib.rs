//! Offline Sync - connectivity-aware response cache and mutation queue
//!
//! Keeps recently fetched resources available while the upstream is
//! unreachable and replays writes made offline once it comes back.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod manager;
pub mod models;
pub mod persistence;
pub mod queue;
pub mod tasks;
pub mod transport;

pub use api::AppState;
pub use config::Config;
pub use error::{Result, SyncError};
pub use manager::{Collaborators, ManagerStatus, OfflineManager, PrefetchReport};
