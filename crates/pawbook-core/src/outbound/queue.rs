//! Outbound send guard.
//!
//! Each conversation gets a single-permit semaphore. A send takes the permit
//! with `try_acquire_owned`, so a second send while one is outstanding fails
//! immediately instead of queueing, and the permit is returned on every exit
//! path when it drops.

use std::sync::Arc;

use dashmap::DashMap;
use pawbook_types::error::MessagingError;
use pawbook_types::message::{Draft, Message, Sender};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::message::MessageStream;

pub struct OutboundQueue<B: Backend> {
    messages: Arc<MessageStream<B>>,
    in_flight: DashMap<String, Arc<Semaphore>>,
}

impl<B: Backend> OutboundQueue<B> {
    pub fn new(messages: Arc<MessageStream<B>>) -> Self {
        Self {
            messages,
            in_flight: DashMap::new(),
        }
    }

    /// Send the draft's text to a conversation.
    ///
    /// On success the draft is cleared and the created message returned. A
    /// rejected create surfaces as `SendFailed` and leaves the draft as it
    /// was for a manual retry. A `Decode` error means the message was created
    /// but the returned record was unreadable; the draft is cleared then too,
    /// since retrying would post the message twice.
    pub async fn send(
        &self,
        conversation_id: &str,
        sender: &Sender,
        draft: &mut Draft,
    ) -> Result<Message, MessagingError> {
        if draft.is_blank() {
            return Err(MessagingError::EmptyMessage);
        }

        let slot = self.slot(conversation_id);
        let _permit = slot
            .try_acquire_owned()
            .map_err(|_| MessagingError::SendInProgress(conversation_id.to_string()))?;

        debug!(conversation_id, sender_id = %sender.id, "Sending message");
        match self
            .messages
            .append(conversation_id, &sender.id, &sender.display_name, draft.text())
            .await
        {
            Ok(message) => {
                draft.clear();
                Ok(message)
            }
            // `append` only yields `Decode` once the create has succeeded.
            Err(MessagingError::Decode(reason)) => {
                draft.clear();
                warn!(conversation_id, error = %reason, "Sent message could not be decoded");
                Err(MessagingError::Decode(reason))
            }
            Err(MessagingError::BackendUnavailable(e)) => {
                warn!(conversation_id, error = %e, "Send failed");
                Err(MessagingError::SendFailed(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a send is outstanding for the conversation.
    pub fn is_sending(&self, conversation_id: &str) -> bool {
        self.in_flight
            .get(conversation_id)
            .is_some_and(|slot| slot.available_permits() == 0)
    }

    fn slot(&self, conversation_id: &str) -> Arc<Semaphore> {
        self.in_flight
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }
}
