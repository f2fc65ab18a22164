//! Message and draft types for Pawbook direct messaging.
//!
//! Messages are immutable once the backend has assigned their id and
//! creation timestamp. Within a conversation they are totally ordered by
//! `created_at`, ties broken by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    /// Sender's user identifier (an email address).
    #[serde(rename = "sender_email")]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    /// Backend-assigned creation time.
    #[serde(rename = "created_date")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Sort messages oldest first; ties broken by id.
    pub fn sort_chronological(messages: &mut [Message]) {
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

/// Fields sent to the backend when creating a message.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub conversation_id: String,
    #[serde(rename = "sender_email")]
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
}

/// The user sending messages from a composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    pub display_name: String,
}

impl Sender {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Composer text owned by the caller.
///
/// A successful send clears it; a failed send leaves it untouched so the
/// user can retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    text: String,
}

impl Draft {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Whether the draft has nothing to send.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}
