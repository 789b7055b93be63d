//! Background Tasks Module
//!
//! Long-running tasks spawned by the offline manager.
//!
//! # Tasks
//! - Drain: periodic and on-demand queue draining while online
//! - Connectivity: drains as soon as the agent comes back online
//! - Signal: feeds host connectivity reports into the monitor

mod connectivity;
mod drain;

pub use connectivity::{spawn_connectivity_task, spawn_signal_task};
pub use drain::spawn_drain_task;
