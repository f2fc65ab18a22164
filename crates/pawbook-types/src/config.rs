//! Configuration types for Pawbook messaging.
//!
//! `PawbookConfig` represents the top-level `config.toml` that controls sync
//! cadence and the hosted backend connection. All fields have defaults, so an
//! empty file (or no file) yields a working configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound for any refresh interval.
pub const MIN_REFRESH_MS: u64 = 250;

/// Top-level configuration.
///
/// Loaded from `~/.pawbook/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PawbookConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

/// Polling cadence and buffer sizes for the sync scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Conversation list refresh interval while the list is mounted.
    #[serde(default = "default_conversation_refresh_ms")]
    pub conversation_refresh_ms: u64,

    /// Message refresh interval while a conversation is open.
    #[serde(default = "default_message_refresh_ms")]
    pub message_refresh_ms: u64,

    /// Maximum characters kept in a conversation's last-message preview.
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,

    /// Capacity of push-event channels.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_conversation_refresh_ms() -> u64 {
    5_000
}

fn default_message_refresh_ms() -> u64 {
    3_000
}

fn default_preview_max_chars() -> usize {
    crate::conversation::PREVIEW_MAX_CHARS
}

fn default_event_buffer() -> usize {
    256
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conversation_refresh_ms: default_conversation_refresh_ms(),
            message_refresh_ms: default_message_refresh_ms(),
            preview_max_chars: default_preview_max_chars(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl SyncConfig {
    /// Conversation list interval, clamped to [`MIN_REFRESH_MS`].
    pub fn conversation_refresh(&self) -> Duration {
        Duration::from_millis(self.conversation_refresh_ms.max(MIN_REFRESH_MS))
    }

    /// Active conversation interval, clamped to [`MIN_REFRESH_MS`].
    pub fn message_refresh(&self) -> Duration {
        Duration::from_millis(self.message_refresh_ms.max(MIN_REFRESH_MS))
    }
}

/// Connection settings for the hosted entity backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// API key; `PAWBOOK_API_KEY` takes precedence when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_app_id() -> String {
    "pawbook".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: default_app_id(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Copy of this config with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

// Hand-written so the API key never reaches logs.
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
