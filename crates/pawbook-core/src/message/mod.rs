//! Per-conversation message logs.

pub mod stream;

pub use stream::{MergeOutcome, MessageStream};
