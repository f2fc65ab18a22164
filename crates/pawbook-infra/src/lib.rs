//! Infrastructure layer for Pawbook.
//!
//! Contains the implementations of the `Backend` port defined in
//! `pawbook-core` (an in-process backend and the hosted REST + SSE adapter),
//! the `config.toml` loader, and data directory resolution.

pub mod config;
pub mod filesystem;
pub mod http;
pub mod memory;
