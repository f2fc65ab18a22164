//! View-lifecycle driven refresh scheduling.
//!
//! `SyncScheduler` owns the periodic and push-driven refresh tasks for the
//! conversation list and the open conversation, and publishes fresh
//! snapshots through `tokio::sync::watch` channels.

pub mod scheduler;
mod scope;

pub use scheduler::{ActiveLog, SyncScheduler, SyncState};
