//! Shared domain types for Pawbook messaging.
//!
//! This crate contains the types exchanged between the messaging stores, the
//! sync scheduler and the backend adapters: conversations, messages, backend
//! records and events, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod entity;
pub mod error;
pub mod message;
