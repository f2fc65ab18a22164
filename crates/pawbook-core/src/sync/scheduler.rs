//! Sync scheduler: refresh tasks bound to view lifecycles.
//!
//! State machine:
//!
//! ```text
//! Idle --mount_list--> ListActive --open_conversation--> ConversationActive
//!  ^                      |  ^                                  |
//!  +------unmount---------+  +--------close_conversation--------+
//! ```
//!
//! `unmount` from `ConversationActive` closes the conversation first.
//! Every task runs inside a [`TaskScope`]; leaving a state cancels the
//! task and waits for it, which also drops its push subscription.

use std::sync::Arc;
use std::time::Duration;

use pawbook_types::config::SyncConfig;
use pawbook_types::conversation::Conversation;
use pawbook_types::entity::EntityKind;
use pawbook_types::error::SyncError;
use pawbook_types::message::Message;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::backend::{Backend, Push, Subscription};
use crate::conversation::ConversationStore;
use crate::message::MessageStream;
use crate::sync::scope::TaskScope;

const CONVERSATION_ID: &str = "conversation_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    ListActive,
    ConversationActive,
}

/// Published message log of the open conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveLog {
    pub conversation_id: Option<String>,
    pub messages: Vec<Message>,
}

struct ListScope {
    user_id: String,
    task: TaskScope,
}

struct ConversationScope {
    conversation_id: String,
    task: TaskScope,
}

#[derive(Default)]
struct Scopes {
    list: Option<ListScope>,
    conversation: Option<ConversationScope>,
}

/// Drives refreshes for the mounted conversation list and the open
/// conversation.
pub struct SyncScheduler<B: Backend + 'static> {
    conversations: Arc<ConversationStore<B>>,
    messages: Arc<MessageStream<B>>,
    config: SyncConfig,
    list_tx: Arc<watch::Sender<Vec<Conversation>>>,
    log_tx: Arc<watch::Sender<ActiveLog>>,
    active: Arc<watch::Sender<Option<String>>>,
    scopes: Mutex<Scopes>,
}

impl<B: Backend + 'static> SyncScheduler<B> {
    pub fn new(messages: Arc<MessageStream<B>>, config: SyncConfig) -> Self {
        let (list_tx, _) = watch::channel(Vec::new());
        let (log_tx, _) = watch::channel(ActiveLog::default());
        let (active, _) = watch::channel(None);
        Self {
            conversations: messages.conversations().clone(),
            messages,
            config,
            list_tx: Arc::new(list_tx),
            log_tx: Arc::new(log_tx),
            active: Arc::new(active),
            scopes: Mutex::new(Scopes::default()),
        }
    }

    /// Latest conversation list of the mounted user.
    pub fn conversations(&self) -> watch::Receiver<Vec<Conversation>> {
        self.list_tx.subscribe()
    }

    /// Latest message log of the open conversation.
    pub fn messages(&self) -> watch::Receiver<ActiveLog> {
        self.log_tx.subscribe()
    }

    pub fn active_conversation(&self) -> Option<String> {
        self.active.borrow().clone()
    }

    pub async fn state(&self) -> SyncState {
        let scopes = self.scopes.lock().await;
        match (&scopes.list, &scopes.conversation) {
            (None, _) => SyncState::Idle,
            (Some(_), None) => SyncState::ListActive,
            (Some(_), Some(_)) => SyncState::ConversationActive,
        }
    }

    /// Start refreshing `user_id`'s conversation list.
    ///
    /// Mounting again for the same user is a no-op. Mounting for another
    /// user closes any open conversation and replaces the list task.
    pub async fn mount_list(&self, user_id: &str) {
        let mut scopes = self.scopes.lock().await;
        if let Some(list) = &scopes.list {
            if list.user_id == user_id {
                return;
            }
        }

        if let Some(conversation) = scopes.conversation.take() {
            self.release_conversation(conversation).await;
        }
        if let Some(previous) = scopes.list.take() {
            previous.task.shutdown().await;
        }

        self.list_tx
            .send_replace(self.conversations.cached(user_id).unwrap_or_default());

        let store = self.conversations.clone();
        let invalidations = store.invalidations();
        let publish = self.list_tx.clone();
        let period = self.config.conversation_refresh();
        let owner = user_id.to_string();
        let task = TaskScope::spawn(move |token| {
            run_list_sync(store, invalidations, owner, period, publish, token)
        });

        info!(user_id, "Conversation list mounted");
        scopes.list = Some(ListScope {
            user_id: user_id.to_string(),
            task,
        });
    }

    /// Open a conversation, replacing any open one.
    ///
    /// Fails with `NotMounted` while the list is not mounted.
    pub async fn open_conversation(&self, conversation_id: &str) -> Result<(), SyncError> {
        let mut scopes = self.scopes.lock().await;
        if scopes.list.is_none() {
            return Err(SyncError::NotMounted);
        }
        if let Some(open) = &scopes.conversation {
            if open.conversation_id == conversation_id {
                return Ok(());
            }
        }
        if let Some(previous) = scopes.conversation.take() {
            self.release_conversation(previous).await;
        }

        self.active.send_replace(Some(conversation_id.to_string()));
        self.log_tx.send_replace(ActiveLog {
            conversation_id: Some(conversation_id.to_string()),
            messages: self.messages.snapshot(conversation_id),
        });

        let subscription = match self.conversations.backend().subscribe(EntityKind::Message) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(conversation_id, error = %e, "Push subscription unavailable; polling only");
                None
            }
        };

        let worker = MessageSync {
            messages: self.messages.clone(),
            conversation_id: conversation_id.to_string(),
            period: self.config.message_refresh(),
            active: self.active.subscribe(),
            invalidations: self.messages.invalidations(conversation_id),
            publish: self.log_tx.clone(),
        };
        let task = TaskScope::spawn(move |token| worker.run(subscription, token));

        info!(conversation_id, "Conversation opened");
        scopes.conversation = Some(ConversationScope {
            conversation_id: conversation_id.to_string(),
            task,
        });
        Ok(())
    }

    /// Close the open conversation, if any.
    pub async fn close_conversation(&self) {
        let mut scopes = self.scopes.lock().await;
        if let Some(conversation) = scopes.conversation.take() {
            self.release_conversation(conversation).await;
        }
    }

    /// Stop every task and return to `Idle`.
    pub async fn unmount(&self) {
        let mut scopes = self.scopes.lock().await;
        if let Some(conversation) = scopes.conversation.take() {
            self.release_conversation(conversation).await;
        }
        if let Some(list) = scopes.list.take() {
            list.task.shutdown().await;
            self.list_tx.send_replace(Vec::new());
            info!(user_id = %list.user_id, "Conversation list unmounted");
        }
    }

    async fn release_conversation(&self, scope: ConversationScope) {
        self.active.send_replace(None);
        scope.task.shutdown().await;
        self.messages.evict(&scope.conversation_id);
        self.log_tx.send_replace(ActiveLog::default());
        info!(conversation_id = %scope.conversation_id, "Conversation closed");
    }
}

async fn run_list_sync<B: Backend + 'static>(
    store: Arc<ConversationStore<B>>,
    mut invalidations: watch::Receiver<u64>,
    user_id: String,
    period: Duration,
    publish: Arc<watch::Sender<Vec<Conversation>>>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => debug!(user_id = %user_id, "List refresh tick"),
            Ok(()) = invalidations.changed() => debug!(user_id = %user_id, "Conversation list invalidated"),
        }

        let span = info_span!("sync.list_refresh", user_id = %user_id);
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = store.list_for_user(&user_id).instrument(span) => result,
        };

        match result {
            Ok(list) => {
                publish.send_if_modified(|current| {
                    if *current == list {
                        false
                    } else {
                        *current = list;
                        true
                    }
                });
            }
            Err(e) => warn!(user_id = %user_id, error = %e, "Conversation list refresh failed"),
        }
    }
    debug!(user_id = %user_id, "List sync stopped");
}

struct MessageSync<B: Backend + 'static> {
    messages: Arc<MessageStream<B>>,
    conversation_id: String,
    period: Duration,
    active: watch::Receiver<Option<String>>,
    invalidations: watch::Receiver<u64>,
    publish: Arc<watch::Sender<ActiveLog>>,
}

impl<B: Backend + 'static> MessageSync<B> {
    async fn run(mut self, mut subscription: Option<Subscription>, token: CancellationToken) {
        let conversation_id = self.conversation_id.as_str();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => debug!(conversation_id, "Message refresh tick"),
                Ok(()) = self.invalidations.changed() => debug!(conversation_id, "Message log invalidated"),
                push = next_push(&mut subscription) => match push {
                    Some(Push::Event(event)) if event.field_str(CONVERSATION_ID) == Some(conversation_id) => {
                        debug!(conversation_id, event = ?event.event_type, "Push event");
                    }
                    Some(Push::Event(_)) => continue,
                    // Dropped events may have been for this conversation.
                    Some(Push::Lagged(skipped)) => {
                        debug!(conversation_id, skipped, "Push events dropped; refreshing");
                    }
                    None => {
                        warn!(conversation_id, "Push subscription closed; polling only");
                        subscription = None;
                        continue;
                    }
                },
            }

            let span = info_span!("sync.message_refresh", conversation_id = %conversation_id);
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.messages.load_conversation(conversation_id).instrument(span) => result,
            };

            // The conversation may have been closed or replaced while the
            // fetch was in flight.
            if token.is_cancelled() || self.active.borrow().as_deref() != Some(conversation_id) {
                debug!(conversation_id, "Discarding fetch for inactive conversation");
                break;
            }

            match result {
                Ok(fetched) => {
                    let outcome = self.messages.merge(conversation_id, fetched);
                    debug!(
                        conversation_id,
                        inserted = outcome.inserted,
                        count = outcome.total,
                        "Messages merged"
                    );
                    self.publish_snapshot();
                }
                Err(e) => warn!(conversation_id, error = %e, "Message refresh failed"),
            }
        }
        debug!(conversation_id, "Message sync stopped");
    }

    fn publish_snapshot(&self) {
        let snapshot = self.messages.snapshot(&self.conversation_id);
        self.publish.send_if_modified(|log| {
            if log.conversation_id.as_deref() == Some(self.conversation_id.as_str())
                && log.messages == snapshot
            {
                false
            } else {
                *log = ActiveLog {
                    conversation_id: Some(self.conversation_id.clone()),
                    messages: snapshot,
                };
                true
            }
        });
    }
}

async fn next_push(subscription: &mut Option<Subscription>) -> Option<Push> {
    match subscription {
        Some(subscription) => subscription.next_push().await,
        None => std::future::pending().await,
    }
}
