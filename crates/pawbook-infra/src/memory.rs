//! In-process implementation of the `Backend` port.
//!
//! Records live in a `DashMap` keyed by entity kind. Ids are UUID v7 and
//! timestamps are strictly increasing, so records created in the same
//! millisecond still sort in creation order. Every create and update is
//! broadcast to subscribers, mirroring the hosted backend's push channel.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use pawbook_core::backend::{Backend, Subscription};
use pawbook_types::entity::{
    EntityEvent, EntityKind, EventType, Predicate, Record, SortKey, fields,
};
use pawbook_types::error::BackendError;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_EVENT_BUFFER: usize = 256;

pub struct MemoryBackend {
    records: DashMap<EntityKind, Vec<Record>>,
    events: broadcast::Sender<EntityEvent>,
    last_stamp_ms: AtomicI64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_event_buffer(DEFAULT_EVENT_BUFFER)
    }

    /// Create a backend whose push channel holds `capacity` events.
    pub fn with_event_buffer(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            records: DashMap::new(),
            events,
            last_stamp_ms: AtomicI64::new(0),
        }
    }

    /// Number of stored records of a kind.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.records.get(&kind).map(|r| r.len()).unwrap_or(0)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Next creation timestamp, at least one millisecond after the last.
    fn next_stamp(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_stamp_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        let millis = now.max(previous + 1);
        DateTime::<Utc>::from_timestamp_millis(millis)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn publish(&self, event_type: EventType, kind: EntityKind, record: &Record) {
        // No subscribers is not an error.
        let _ = self.events.send(EntityEvent::new(event_type, kind, record.clone()));
    }

    fn select(
        &self,
        kind: EntityKind,
        predicate: Option<&Predicate>,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .records
            .get(&kind)
            .map(|all| {
                all.iter()
                    .filter(|record| predicate.is_none_or(|p| p.matches(record)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort.apply(&mut records);
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    async fn list(
        &self,
        kind: EntityKind,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, BackendError> {
        Ok(self.select(kind, None, sort, limit))
    }

    async fn filter(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, BackendError> {
        Ok(self.select(kind, Some(predicate), sort, limit))
    }

    async fn create(&self, kind: EntityKind, mut record: Record) -> Result<Record, BackendError> {
        let stamp = self.next_stamp();
        record.insert(fields::ID.to_string(), json!(Uuid::now_v7().to_string()));
        record.insert(fields::CREATED_DATE.to_string(), json!(stamp));
        record.insert(fields::UPDATED_DATE.to_string(), json!(stamp));

        self.records.entry(kind).or_default().push(record.clone());
        self.publish(EventType::Create, kind, &record);
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        changes: Record,
    ) -> Result<Record, BackendError> {
        let stamp = self.next_stamp();
        let updated = {
            let mut all = self.records.get_mut(&kind).ok_or(BackendError::NotFound)?;
            let record = all
                .iter_mut()
                .find(|r| r.get(fields::ID).and_then(Value::as_str) == Some(id))
                .ok_or(BackendError::NotFound)?;
            for (field, value) in changes {
                if field == fields::ID || field == fields::CREATED_DATE {
                    continue;
                }
                record.insert(field, value);
            }
            record.insert(fields::UPDATED_DATE.to_string(), json!(stamp));
            record.clone()
        };

        self.publish(EventType::Update, kind, &updated);
        Ok(updated)
    }

    fn subscribe(&self, kind: EntityKind) -> Result<Subscription, BackendError> {
        Ok(Subscription::new(kind, self.events.subscribe()))
    }
}
