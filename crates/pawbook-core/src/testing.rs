//! In-memory mock backend shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use pawbook_types::entity::{EntityEvent, EntityKind, EventType, Predicate, Record, SortKey, fields};
use pawbook_types::error::BackendError;
use serde_json::{Value, json};
use tokio::sync::{Notify, Semaphore, broadcast};

use crate::backend::{Backend, Subscription};

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct Call {
    pub op: &'static str,
    pub kind: EntityKind,
    /// `conversation_id` for filters, record id for updates.
    pub target: Option<String>,
}

pub struct MockBackend {
    records: Mutex<HashMap<EntityKind, Vec<Record>>>,
    events: broadcast::Sender<EntityEvent>,
    next_id: AtomicU64,
    calls: Mutex<Vec<Call>>,
    pub fail_list: AtomicBool,
    pub fail_filter: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    /// Return created records without their `content` field.
    pub mangle_creates: AtomicBool,
    create_gate: Mutex<Option<std::sync::Arc<Semaphore>>>,
    pub create_started: Notify,
    filter_gate: Mutex<Option<std::sync::Arc<Semaphore>>>,
    pub filter_started: Notify,
}

impl MockBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            records: Mutex::new(HashMap::new()),
            events,
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            fail_list: AtomicBool::new(false),
            fail_filter: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            mangle_creates: AtomicBool::new(false),
            create_gate: Mutex::new(None),
            create_started: Notify::new(),
            filter_gate: Mutex::new(None),
            filter_started: Notify::new(),
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn timestamp(n: u64) -> String {
        (Self::base_time() + Duration::milliseconds(n as i64 * 10))
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn record_call(&self, op: &'static str, kind: EntityKind, target: Option<String>) {
        self.calls.lock().unwrap().push(Call { op, kind, target });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `filter` calls issued for a conversation's messages.
    pub fn filter_calls_for(&self, conversation_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                c.op == "filter"
                    && c.kind == EntityKind::Message
                    && c.target.as_deref() == Some(conversation_id)
            })
            .count()
    }

    pub fn count_calls(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.records
            .lock()
            .unwrap()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Insert a record as-is, bypassing id assignment and events.
    pub fn insert_raw(&self, kind: EntityKind, record: Value) {
        if let Value::Object(map) = record {
            self.records
                .lock()
                .unwrap()
                .entry(kind)
                .or_default()
                .push(map);
        }
    }

    /// Publish an event as if another client had changed a record.
    pub fn emit(&self, event: EntityEvent) {
        let _ = self.events.send(event);
    }

    /// Park every subsequent `create` until [`release_creates`] is called.
    pub fn hold_creates(&self) {
        *self.create_gate.lock().unwrap() = Some(std::sync::Arc::new(Semaphore::new(0)));
    }

    pub fn release_creates(&self) {
        if let Some(gate) = self.create_gate.lock().unwrap().take() {
            gate.add_permits(1024);
        }
    }

    /// Park every subsequent `filter` until [`release_filters`] is called.
    pub fn hold_filters(&self) {
        *self.filter_gate.lock().unwrap() = Some(std::sync::Arc::new(Semaphore::new(0)));
    }

    pub fn release_filters(&self) {
        if let Some(gate) = self.filter_gate.lock().unwrap().take() {
            gate.add_permits(1024);
        }
    }

    fn sorted(mut records: Vec<Record>, sort: &SortKey, limit: Option<usize>) -> Vec<Record> {
        sort.apply(&mut records);
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }
}

impl Backend for MockBackend {
    async fn list(
        &self,
        kind: EntityKind,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, BackendError> {
        self.record_call("list", kind, None);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("list refused".to_string()));
        }
        let records = self
            .records
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        Ok(Self::sorted(records, sort, limit))
    }

    async fn filter(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, BackendError> {
        let target = predicate
            .iter()
            .find(|(field, _)| field.as_str() == "conversation_id")
            .and_then(|(_, v)| v.as_str().map(str::to_string));
        self.record_call("filter", kind, target);
        self.filter_started.notify_one();

        let gate = self.filter_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| BackendError::Connection(e.to_string()))?;
        }

        if self.fail_filter.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("filter refused".to_string()));
        }
        let records: Vec<Record> = self
            .records
            .lock()
            .unwrap()
            .get(&kind)
            .map(|all| all.iter().filter(|r| predicate.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(Self::sorted(records, sort, limit))
    }

    async fn create(&self, kind: EntityKind, mut record: Record) -> Result<Record, BackendError> {
        self.record_call("create", kind, None);
        self.create_started.notify_one();

        let gate = self.create_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| BackendError::Connection(e.to_string()))?;
        }

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                body: "create refused".to_string(),
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stamp = Self::timestamp(n);
        record.insert(
            fields::ID.to_string(),
            json!(format!("{}-{n}", kind.as_str().to_lowercase())),
        );
        record.insert(fields::CREATED_DATE.to_string(), json!(stamp));
        record.insert(fields::UPDATED_DATE.to_string(), json!(stamp));

        self.records
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(record.clone());
        self.emit(EntityEvent::new(EventType::Create, kind, record.clone()));
        if self.mangle_creates.load(Ordering::SeqCst) {
            record.remove("content");
        }
        Ok(record)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        changes: Record,
    ) -> Result<Record, BackendError> {
        self.record_call("update", kind, Some(id.to_string()));
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("update refused".to_string()));
        }
        let updated = {
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(&kind)
                .and_then(|all| {
                    all.iter_mut()
                        .find(|r| r.get(fields::ID).and_then(Value::as_str) == Some(id))
                })
                .ok_or(BackendError::NotFound)?;
            for (key, value) in changes {
                record.insert(key, value);
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            record.insert(fields::UPDATED_DATE.to_string(), json!(Self::timestamp(n)));
            record.clone()
        };
        self.emit(EntityEvent::new(EventType::Update, kind, updated.clone()));
        Ok(updated)
    }

    fn subscribe(&self, kind: EntityKind) -> Result<Subscription, BackendError> {
        self.record_call("subscribe", kind, None);
        Ok(Subscription::new(kind, self.events.subscribe()))
    }
}
