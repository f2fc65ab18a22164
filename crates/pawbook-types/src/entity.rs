//! Backend record, query and event types.
//!
//! The hosted backend is schemaless: every entity is a JSON object carrying
//! backend-assigned `id`, `created_date` and `updated_date` fields. These
//! types describe how the messaging stores talk about those records without
//! committing to any particular backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw backend record (a JSON object).
pub type Record = serde_json::Map<String, Value>;

/// Field names assigned by the backend to every record.
pub mod fields {
    pub const ID: &str = "id";
    pub const CREATED_DATE: &str = "created_date";
    pub const UPDATED_DATE: &str = "updated_date";
}

/// Entity collections the messaging module reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Conversation,
    Message,
}

impl EntityKind {
    /// Collection name as the backend spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Conversation => "Conversation",
            EntityKind::Message => "Message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Conversation" => Ok(EntityKind::Conversation),
            "Message" => Ok(EntityKind::Message),
            other => Err(format!("unknown entity kind: '{other}'")),
        }
    }
}

/// Kind of change carried by a push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Create => write!(f, "create"),
            EventType::Update => write!(f, "update"),
            EventType::Delete => write!(f, "delete"),
        }
    }
}

/// A change notification delivered by a backend subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub entity: EntityKind,
    /// The record as it looks after the change (or before, for deletes).
    #[serde(default)]
    pub data: Record,
}

impl EntityEvent {
    pub fn new(event_type: EventType, entity: EntityKind, data: Record) -> Self {
        Self {
            event_type,
            entity,
            data,
        }
    }

    /// Read a string field from the event payload.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Sort direction for list and filter queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A sort key in the backend's syntax: `field` ascending, `-field` descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    /// Sort records by this key, ties broken by ascending id.
    pub fn apply(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            let ord = compare_values(a.get(&self.field), b.get(&self.field));
            let ord = match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then_with(|| compare_values(a.get(fields::ID), b.get(fields::ID)))
        });
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::Asc => write!(f, "{}", self.field),
            SortOrder::Desc => write!(f, "-{}", self.field),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (order, field) = match trimmed.strip_prefix('-') {
            Some(rest) => (SortOrder::Desc, rest),
            None => (SortOrder::Asc, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        if field.is_empty() {
            return Err(format!("invalid sort key: '{s}'"));
        }
        Ok(Self {
            field: field.to_string(),
            order,
        })
    }
}

/// Field-equality predicate for `filter` queries.
///
/// Serializes as a flat JSON object (`{"conversation_id": "..."}`), which is
/// also the query shape the hosted backend accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(BTreeMap<String, Value>);

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Whether a record satisfies every equality in this predicate.
    pub fn matches(&self, record: &Record) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Compare two record field values for sorting.
///
/// RFC 3339 strings compare as instants (fractional-second precision varies,
/// so byte order is not time order), numbers numerically, other strings
/// lexically. Missing values sort first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(tx), Ok(ty)) => tx.with_timezone(&Utc).cmp(&ty.with_timezone(&Utc)),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_key_parse_descending() {
        let key: SortKey = "-last_message_at".parse().unwrap();
        assert_eq!(key.field, "last_message_at");
        assert_eq!(key.order, SortOrder::Desc);
        assert_eq!(key.to_string(), "-last_message_at");
    }

    #[test]
    fn test_sort_key_parse_ascending() {
        let key: SortKey = "created_date".parse().unwrap();
        assert_eq!(key, SortKey::asc("created_date"));
    }

    #[test]
    fn test_sort_key_apply_descending_with_id_ties() {
        let mut records: Vec<Record> = [
            json!({"id": "b", "n": 1}),
            json!({"id": "c", "n": 2}),
            json!({"id": "a", "n": 1}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();

        SortKey::desc("n").apply(&mut records);
        let ids: Vec<&str> = records.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_sort_key_rejects_empty_field() {
        assert!("-".parse::<SortKey>().is_err());
        assert!("".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in [EntityKind::Conversation, EntityKind::Message] {
            let parsed: EntityKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("User".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_event_deserializes_backend_shape() {
        let raw = json!({
            "type": "create",
            "entity": "Message",
            "data": {"id": "m1", "conversation_id": "c1"}
        });
        let event: EntityEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type, EventType::Create);
        assert_eq!(event.entity, EntityKind::Message);
        assert_eq!(event.field_str("conversation_id"), Some("c1"));
        assert_eq!(event.field_str("missing"), None);
    }

    #[test]
    fn test_predicate_matches_all_fields() {
        let predicate = Predicate::new()
            .field_eq("conversation_id", "c1")
            .field_eq("sender_email", "alice");

        let mut record = Record::new();
        record.insert("conversation_id".into(), json!("c1"));
        assert!(!predicate.matches(&record));

        record.insert("sender_email".into(), json!("alice"));
        assert!(predicate.matches(&record));

        record.insert("conversation_id".into(), json!("c2"));
        assert!(!predicate.matches(&record));
    }

    #[test]
    fn test_predicate_serializes_flat() {
        let predicate = Predicate::new().field_eq("conversation_id", "c1");
        let json = serde_json::to_string(&predicate).unwrap();
        assert_eq!(json, r#"{"conversation_id":"c1"}"#);
    }

    #[test]
    fn test_compare_values_uses_instants_for_timestamps() {
        use std::cmp::Ordering;

        // Byte order puts "00Z" after "00.500Z"; time order does not.
        let whole = json!("2024-05-01T10:00:00Z");
        let fractional = json!("2024-05-01T10:00:00.500Z");
        assert_eq!(
            compare_values(Some(&whole), Some(&fractional)),
            Ordering::Less
        );
        let earlier = whole;
        assert_eq!(compare_values(None, Some(&earlier)), Ordering::Less);
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(10))),
            Ordering::Less
        );
    }
}
