//! Ordered, deduplicated message logs with optimistic append.
//!
//! `MessageStream` keeps one log per conversation. Logs are only ever
//! changed through [`MessageStream::merge`], which is keyed by message id,
//! so the same message delivered by a push event, an interval refresh and a
//! local append ends up in the log once, in `created_at` order.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use pawbook_types::entity::{EntityKind, Predicate, SortKey, fields};
use pawbook_types::error::MessagingError;
use pawbook_types::message::{Message, NewMessage};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{Backend, from_record, to_record};
use crate::conversation::ConversationStore;

const CONVERSATION_ID: &str = "conversation_id";

/// Result of merging fetched or pushed messages into a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Messages that were not in the log before.
    pub inserted: usize,
    /// Log length after the merge.
    pub total: usize,
}

pub struct MessageStream<B: Backend> {
    backend: Arc<B>,
    conversations: Arc<ConversationStore<B>>,
    logs: DashMap<String, Vec<Message>>,
    invalidations: DashMap<String, watch::Sender<u64>>,
}

impl<B: Backend> MessageStream<B> {
    /// Create a stream sharing the conversation store's backend.
    pub fn new(conversations: Arc<ConversationStore<B>>) -> Self {
        Self {
            backend: conversations.backend().clone(),
            conversations,
            logs: DashMap::new(),
            invalidations: DashMap::new(),
        }
    }

    pub fn conversations(&self) -> &Arc<ConversationStore<B>> {
        &self.conversations
    }

    /// Fetch every message of a conversation, oldest first.
    ///
    /// Does not touch the cached log.
    pub async fn load_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, MessagingError> {
        let predicate = Predicate::new().field_eq(CONVERSATION_ID, conversation_id);
        let records = self
            .backend
            .filter(
                EntityKind::Message,
                &predicate,
                &SortKey::asc(fields::CREATED_DATE),
                None,
            )
            .await?;

        let mut messages: Vec<Message> = records
            .into_iter()
            .filter_map(|record| match from_record::<Message>(record) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(conversation_id, error = %e, "Skipping malformed message record");
                    None
                }
            })
            .filter(|message| message.conversation_id == conversation_id)
            .collect();
        Message::sort_chronological(&mut messages);
        Ok(messages)
    }

    /// Load a conversation and merge it into the cached log.
    ///
    /// Returns the merged snapshot.
    pub async fn refresh(&self, conversation_id: &str) -> Result<Vec<Message>, MessagingError> {
        let fetched = self.load_conversation(conversation_id).await?;
        let outcome = self.merge(conversation_id, fetched);
        debug!(
            conversation_id,
            inserted = outcome.inserted,
            count = outcome.total,
            "Messages refreshed"
        );
        Ok(self.snapshot(conversation_id))
    }

    /// Merge messages into a conversation's log.
    ///
    /// Ids already in the log and messages of other conversations are
    /// ignored, so repeated or reordered deliveries leave the same log.
    pub fn merge(
        &self,
        conversation_id: &str,
        messages: impl IntoIterator<Item = Message>,
    ) -> MergeOutcome {
        let mut log = self.logs.entry(conversation_id.to_string()).or_default();
        let mut known: HashSet<String> = log.iter().map(|m| m.id.clone()).collect();

        let mut inserted = 0;
        for message in messages {
            if message.conversation_id != conversation_id {
                continue;
            }
            if known.insert(message.id.clone()) {
                log.push(message);
                inserted += 1;
            }
        }
        if inserted > 0 {
            Message::sort_chronological(&mut log);
        }

        MergeOutcome {
            inserted,
            total: log.len(),
        }
    }

    /// The cached log of a conversation, oldest first.
    pub fn snapshot(&self, conversation_id: &str) -> Vec<Message> {
        self.logs
            .get(conversation_id)
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Drop the cached log of a conversation.
    pub fn evict(&self, conversation_id: &str) {
        if self.logs.remove(conversation_id).is_some() {
            debug!(conversation_id, "Message log evicted");
        }
    }

    /// Send a message and merge the created record into the log.
    ///
    /// Content is trimmed; whitespace-only content fails with
    /// `EmptyMessage` before any backend call. Once the message exists
    /// server-side it is returned even if the conversation preview could not
    /// be updated.
    pub async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        sender_name: &str,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::EmptyMessage);
        }

        let new = NewMessage {
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            content: content.to_string(),
        };
        let record = self
            .backend
            .create(EntityKind::Message, to_record(&new)?)
            .await?;
        let message: Message = from_record(record)?;

        self.merge(conversation_id, [message.clone()]);
        self.invalidate(conversation_id);
        info!(conversation_id, message_id = %message.id, "Message sent");

        if let Err(e) = self
            .conversations
            .record_outgoing(conversation_id, &message.content, message.created_at)
            .await
        {
            warn!(conversation_id, error = %e, "Failed to update conversation preview");
        }

        Ok(message)
    }

    /// Mark a conversation's log as stale.
    pub fn invalidate(&self, conversation_id: &str) {
        self.invalidations
            .entry(conversation_id.to_string())
            .or_insert_with(|| watch::Sender::new(0))
            .send_modify(|n| *n = n.wrapping_add(1));
    }

    /// A receiver that changes whenever one conversation's log is
    /// invalidated.
    pub fn invalidations(&self, conversation_id: &str) -> watch::Receiver<u64> {
        self.invalidations
            .entry(conversation_id.to_string())
            .or_insert_with(|| watch::Sender::new(0))
            .subscribe()
    }
}
