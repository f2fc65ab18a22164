//! Tracing setup for the Pawbook binaries.

pub mod tracing_setup;
