//! Conversation store backed by the `Backend` port.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pawbook_types::conversation::{
    Conversation, ConversationPreview, NewConversation, PREVIEW_MAX_CHARS, Participants,
    same_user, truncate_preview,
};
use pawbook_types::entity::{EntityKind, SortKey};
use pawbook_types::error::MessagingError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{Backend, from_record, to_record};

const LAST_MESSAGE_AT: &str = "last_message_at";

/// Reads, creates and updates conversations for a signed-in user.
///
/// Generic over `Backend` so the core never depends on a concrete adapter.
pub struct ConversationStore<B: Backend> {
    backend: Arc<B>,
    /// Last successful listing, keyed by lower-cased user id.
    cache: DashMap<String, Vec<Conversation>>,
    /// Bumped on every invalidation; each scheduler holds its own receiver.
    invalidation: watch::Sender<u64>,
    preview_max_chars: usize,
}

impl<B: Backend> ConversationStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            cache: DashMap::new(),
            invalidation: watch::Sender::new(0),
            preview_max_chars: PREVIEW_MAX_CHARS,
        }
    }

    /// Override the preview length (from `SyncConfig::preview_max_chars`).
    pub fn with_preview_max_chars(mut self, max_chars: usize) -> Self {
        self.preview_max_chars = max_chars;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// List the conversations `user_id` takes part in, most recent first.
    ///
    /// A successful listing replaces the cached one. On failure the cache is
    /// left as it was and `BackendUnavailable` is returned; there is no retry.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, MessagingError> {
        let records = self
            .backend
            .list(EntityKind::Conversation, &SortKey::desc(LAST_MESSAGE_AT), None)
            .await?;

        let mut conversations: Vec<Conversation> = records
            .into_iter()
            .filter_map(|record| match from_record::<Conversation>(record) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed conversation record");
                    None
                }
            })
            .filter(|conversation| conversation.participants.contains(user_id))
            .collect();
        Conversation::sort_recent_first(&mut conversations);

        debug!(user_id, count = conversations.len(), "Listed conversations");
        self.cache.insert(cache_key(user_id), conversations.clone());
        Ok(conversations)
    }

    /// The last successful listing for `user_id`, if any.
    pub fn cached(&self, user_id: &str) -> Option<Vec<Conversation>> {
        self.cache.get(&cache_key(user_id)).map(|entry| entry.clone())
    }

    /// Return the conversation between `user_a` and `user_b`, creating it if
    /// none exists.
    ///
    /// Lookup ignores case and participant order. Two near-simultaneous
    /// calls for a new pair can both miss and create duplicates; only a
    /// backend uniqueness constraint would prevent that.
    pub async fn find_or_create(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation, MessagingError> {
        let (user_a, user_b) = (user_a.trim(), user_b.trim());
        if user_a.is_empty() || user_b.is_empty() {
            return Err(MessagingError::InvalidParticipants(
                "participant id must not be blank".to_string(),
            ));
        }
        if same_user(user_a, user_b) {
            return Err(MessagingError::InvalidParticipants(format!(
                "{user_a} cannot start a conversation with themselves"
            )));
        }

        let existing = self
            .list_for_user(user_a)
            .await?
            .into_iter()
            .find(|conversation| conversation.participants.is_pair(user_a, user_b));
        if let Some(conversation) = existing {
            debug!(conversation_id = %conversation.id, "Found existing conversation");
            return Ok(conversation);
        }

        let new = NewConversation {
            participants: Participants::new(user_a, user_b.to_lowercase()),
            last_message: String::new(),
            last_message_at: Utc::now(),
        };
        let record = self
            .backend
            .create(EntityKind::Conversation, to_record(&new)?)
            .await?;
        let conversation: Conversation = from_record(record)?;

        info!(conversation_id = %conversation.id, "Conversation created");
        self.invalidate();
        Ok(conversation)
    }

    /// Record an outgoing message as the conversation's preview.
    ///
    /// The text is truncated to the configured preview length.
    pub async fn record_outgoing(
        &self,
        conversation_id: &str,
        preview_text: &str,
        at: DateTime<Utc>,
    ) -> Result<Conversation, MessagingError> {
        let preview = ConversationPreview {
            last_message: truncate_preview(preview_text, self.preview_max_chars),
            last_message_at: at,
        };
        let record = self
            .backend
            .update(EntityKind::Conversation, conversation_id, to_record(&preview)?)
            .await?;
        let conversation: Conversation = from_record(record)?;

        debug!(conversation_id, "Conversation preview updated");
        self.invalidate();
        Ok(conversation)
    }

    /// Signal that listings are stale.
    ///
    /// Every receiver from [`invalidations`] sees the change, so several
    /// schedulers can share one store.
    ///
    /// [`invalidations`]: ConversationStore::invalidations
    pub fn invalidate(&self) {
        self.invalidation.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// A receiver that changes whenever listings are invalidated.
    ///
    /// Only invalidations after this call are observed.
    pub fn invalidations(&self) -> watch::Receiver<u64> {
        self.invalidation.subscribe()
    }
}

/// The counterpart of `me` in `conversation`, or `"Unknown"` when `me` does
/// not take part.
pub fn other_participant<'a>(conversation: &'a Conversation, me: &str) -> &'a str {
    conversation.participants.other(me).unwrap_or("Unknown")
}

fn cache_key(user_id: &str) -> String {
    user_id.trim().to_lowercase()
}
