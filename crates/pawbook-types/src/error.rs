use thiserror::Error;

/// Errors from backend operations (used by the `Backend` trait in pawbook-core).
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend connection error: {0}")]
    Connection(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("entity not found")]
    NotFound,

    #[error("malformed backend record: {0}")]
    Decode(String),
}

/// Errors surfaced by the messaging stores and the outbound queue.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// A backend call failed. Not retried locally; the next scheduled
    /// refresh tries again.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    #[error("message is empty")]
    EmptyMessage,

    #[error("a send is already in progress for conversation {0}")]
    SendInProgress(String),

    /// The create call was attempted and rejected. The draft is kept.
    #[error("send failed: {0}")]
    SendFailed(#[source] BackendError),

    #[error("invalid participants: {0}")]
    InvalidParticipants(String),

    #[error("unexpected record shape: {0}")]
    Decode(String),
}

impl From<BackendError> for MessagingError {
    fn from(err: BackendError) -> Self {
        MessagingError::BackendUnavailable(err)
    }
}

/// Errors from sync scheduler state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("conversation list is not mounted")]
    NotMounted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "backend returned HTTP 503: maintenance");
    }

    #[test]
    fn test_messaging_error_from_backend() {
        let err: MessagingError = BackendError::Connection("refused".to_string()).into();
        assert!(matches!(err, MessagingError::BackendUnavailable(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_sync_error_display() {
        assert_eq!(
            SyncError::NotMounted.to_string(),
            "conversation list is not mounted"
        );
    }
}
