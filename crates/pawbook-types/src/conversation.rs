//! Conversation types for Pawbook direct messaging.
//!
//! A conversation is a persistent two-party thread. The backend stores the
//! participants as a plain array of user identifiers (email addresses); this
//! module enforces the two-party shape and the case-insensitive membership
//! rules on top of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length (in characters) of a conversation's last-message preview.
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Whether two user identifiers name the same user.
///
/// Identifiers are email addresses, so comparison ignores case and
/// surrounding whitespace.
pub fn same_user(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Truncate message text to a conversation preview.
///
/// Counts characters rather than bytes so multi-byte text is never split.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

/// The two participants of a conversation.
///
/// Order is preserved as stored but ignored by every comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Participants([String; 2]);

impl Participants {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self([a.into(), b.into()])
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|p| same_user(p, user_id))
    }

    /// Whether this conversation is between exactly `a` and `b`, in any order.
    pub fn is_pair(&self, a: &str, b: &str) -> bool {
        (same_user(&self.0[0], a) && same_user(&self.0[1], b))
            || (same_user(&self.0[0], b) && same_user(&self.0[1], a))
    }

    /// The participant that is not `me`, if `me` takes part at all.
    pub fn other(&self, me: &str) -> Option<&str> {
        if same_user(&self.0[0], me) {
            Some(&self.0[1])
        } else if same_user(&self.0[1], me) {
            Some(&self.0[0])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<Vec<String>> for Participants {
    type Error = String;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        let count = value.len();
        let pair: [String; 2] = value
            .try_into()
            .map_err(|_| format!("expected exactly 2 participants, got {count}"))?;
        Ok(Self(pair))
    }
}

impl From<Participants> for Vec<String> {
    fn from(value: Participants) -> Self {
        value.0.into()
    }
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A two-party messaging thread as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: Participants,
    /// Preview of the most recent message, at most [`PREVIEW_MAX_CHARS`].
    #[serde(default)]
    pub last_message: String,
    #[serde(default = "unix_epoch")]
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    /// Sort conversations most recent first; ties broken by id.
    pub fn sort_recent_first(conversations: &mut [Conversation]) {
        conversations.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

/// Fields sent to the backend when creating a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct NewConversation {
    pub participants: Participants,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
}

/// Fields sent to the backend when a new message changes the preview.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationPreview {
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
}
