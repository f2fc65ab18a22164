//! Messaging synchronization logic and the backend port for Pawbook.
//!
//! This crate defines the `Backend` trait that the infrastructure layer
//! implements, and the components built on top of it: `ConversationStore`,
//! `MessageStream`, `OutboundQueue` and `SyncScheduler`. It depends only on
//! `pawbook-types` -- never on `pawbook-infra` or any HTTP crate.

pub mod backend;
pub mod conversation;
pub mod message;
pub mod outbound;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
