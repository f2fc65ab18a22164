//! Outbound message sending with a one-send-per-conversation guard.

pub mod queue;

pub use queue::OutboundQueue;
