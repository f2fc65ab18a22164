//! Backend port for the hosted persistence and pub/sub service.
//!
//! The messaging components never talk to a concrete backend. They consume
//! the five capabilities of the `Backend` trait and the record conventions in
//! `pawbook_types::entity`. Implementations live in pawbook-infra.

pub mod subscription;

pub use subscription::{Push, Subscription};

use pawbook_types::entity::{EntityKind, Predicate, Record, SortKey};
use pawbook_types::error::{BackendError, MessagingError};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Persistence and pub/sub capabilities consumed by the messaging stores.
///
/// Records are JSON objects; the backend assigns `id`, `created_date` and
/// `updated_date`. Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait Backend: Send + Sync {
    /// List every record of a kind, sorted by `sort`.
    fn list(
        &self,
        kind: EntityKind,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> impl std::future::Future<Output = Result<Vec<Record>, BackendError>> + Send;

    /// List the records of a kind matching `predicate`, sorted by `sort`.
    fn filter(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> impl std::future::Future<Output = Result<Vec<Record>, BackendError>> + Send;

    /// Create a record and return it with backend-assigned fields.
    fn create(
        &self,
        kind: EntityKind,
        fields: Record,
    ) -> impl std::future::Future<Output = Result<Record, BackendError>> + Send;

    /// Merge `fields` into an existing record and return the result.
    fn update(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Record,
    ) -> impl std::future::Future<Output = Result<Record, BackendError>> + Send;

    /// Subscribe to change events for a kind.
    ///
    /// Dropping the returned [`Subscription`] unsubscribes.
    fn subscribe(&self, kind: EntityKind) -> Result<Subscription, BackendError>;
}

/// Serialize a typed value into a backend record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record, MessagingError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(MessagingError::Decode(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(MessagingError::Decode(e.to_string())),
    }
}

/// Deserialize a backend record into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, MessagingError> {
    serde_json::from_value(serde_json::Value::Object(record))
        .map_err(|e| MessagingError::Decode(e.to_string()))
}
