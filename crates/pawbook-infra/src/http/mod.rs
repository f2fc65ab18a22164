//! Hosted entity backend over REST and server-sent events.
//!
//! - `client` -- [`HttpBackend`], the `Backend` implementation
//! - `events` -- SSE forwarding into a push [`Subscription`]
//!
//! [`Subscription`]: pawbook_core::backend::Subscription

pub mod client;
pub mod events;

pub use client::HttpBackend;
