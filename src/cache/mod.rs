//! Cache Module
//!
//! Byte-bounded response cache with TTL expiration and priority-weighted
//! eviction.

mod entry;
pub mod eviction;
mod stats;
mod store;


// Re-export public types
pub use entry::{payload_size, CacheEntry, CacheOptions, Priority};
pub use stats::CacheStats;
pub use store::{CacheStore, PutOutcome};
pub(crate) use entry::duration_ms;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
