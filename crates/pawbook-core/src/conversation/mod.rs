//! Conversation listing, lookup and preview maintenance.
//!
//! `ConversationStore` reads and writes `Conversation` records through the
//! `Backend` port and keeps the last good listing per user as a stale
//! fallback for views.

pub mod store;

pub use store::{ConversationStore, other_participant};
