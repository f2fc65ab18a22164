//! Push subscription handle.
//!
//! A `Subscription` wraps a `tokio::sync::broadcast` receiver of
//! [`EntityEvent`]s. Adapters that run a forwarding task attach a
//! `CancellationToken`; dropping the subscription cancels it, so every exit
//! path of the owner releases the upstream feed.

use pawbook_types::entity::{EntityEvent, EntityKind};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One delivery from a [`Subscription`].
#[derive(Debug, Clone)]
pub enum Push {
    Event(EntityEvent),
    /// The receiver fell behind and `skipped` events were dropped.
    Lagged(u64),
}

/// Live feed of change events for one entity kind.
pub struct Subscription {
    kind: EntityKind,
    receiver: broadcast::Receiver<EntityEvent>,
    upstream: Option<CancellationToken>,
}

impl Subscription {
    pub fn new(kind: EntityKind, receiver: broadcast::Receiver<EntityEvent>) -> Self {
        Self {
            kind,
            receiver,
            upstream: None,
        }
    }

    /// Cancel `token` when this subscription is dropped.
    pub fn with_upstream(mut self, token: CancellationToken) -> Self {
        self.upstream = Some(token);
        self
    }

    /// Wait for the next event of this subscription's kind, or a report that
    /// events were dropped.
    ///
    /// Returns `None` once the feed is closed. After a `Lagged` report the
    /// receiver continues with the oldest event still buffered.
    pub async fn next_push(&mut self) -> Option<Push> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.entity == self.kind => return Some(Push::Event(event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(kind = %self.kind, skipped, "push subscription lagged");
                    return Some(Push::Lagged(skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next event of this subscription's kind, skipping lag
    /// reports.
    pub async fn recv(&mut self) -> Option<EntityEvent> {
        loop {
            match self.next_push().await? {
                Push::Event(event) => return Some(event),
                Push::Lagged(_) => continue,
            }
        }
    }

    /// Explicitly unsubscribe. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(token) = self.upstream.take() {
            token.cancel();
        }
        debug!(kind = %self.kind, "unsubscribed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("has_upstream", &self.upstream.is_some())
            .finish()
    }
}
