//! Queue Module
//!
//! Buffers mutating operations issued while disconnected and replays them
//! once connectivity returns.

mod backoff;
mod operation;
mod sync_queue;

pub use backoff::BackoffPolicy;
pub use operation::{ExhaustedOperation, Method, NewOperation, OperationTarget, SyncOperation};
pub use sync_queue::{DrainReport, QueueSettings, SyncQueue};
