//! Server-sent event forwarding for the hosted backend.
//!
//! Each `data:` payload on the events endpoint is one JSON [`EntityEvent`].
//! A forwarding task reads the stream with `reqwest-eventsource` and pushes
//! decoded events into a broadcast channel owned by the returned
//! [`Subscription`]. Dropping the subscription cancels the task, which
//! closes the HTTP stream.

use futures_util::StreamExt;
use pawbook_core::backend::Subscription;
use pawbook_types::entity::{EntityEvent, EntityKind};
use pawbook_types::error::BackendError;
use reqwest::RequestBuilder;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Decode one SSE `data:` payload.
pub fn decode_event(data: &str) -> Result<EntityEvent, BackendError> {
    serde_json::from_str(data).map_err(|e| BackendError::Decode(format!("bad event payload: {e}")))
}

/// Open the event stream for `kind` and forward it into a subscription.
///
/// Must be called from within a tokio runtime.
pub fn spawn_event_forwarder(
    kind: EntityKind,
    request: RequestBuilder,
    buffer: usize,
) -> Result<Subscription, BackendError> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| BackendError::Connection(format!("no async runtime for event stream: {e}")))?;
    let source = EventSource::new(request)
        .map_err(|e| BackendError::Connection(format!("cannot open event stream: {e}")))?;

    let (sender, receiver) = broadcast::channel(buffer);
    let token = CancellationToken::new();
    runtime.spawn(forward_events(kind, source, sender, token.clone()));

    Ok(Subscription::new(kind, receiver).with_upstream(token))
}

async fn forward_events(
    kind: EntityKind,
    mut source: EventSource,
    sender: broadcast::Sender<EntityEvent>,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = source.next() => next,
        };

        match next {
            None => {
                tracing::debug!(kind = %kind, "Event stream finished");
                break;
            }
            Some(Ok(Event::Open)) => tracing::debug!(kind = %kind, "Event stream open"),
            Some(Ok(Event::Message(message))) => match decode_event(&message.data) {
                Ok(event) => {
                    if sender.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(kind = %kind, error = %e, "Skipping event"),
            },
            // The server closed the stream; the source reconnects.
            Some(Err(EventSourceError::StreamEnded)) => {
                tracing::debug!(kind = %kind, "Event stream ended, reconnecting");
            }
            Some(Err(
                e @ (EventSourceError::InvalidStatusCode(..)
                | EventSourceError::InvalidContentType(..)),
            )) => {
                tracing::warn!(kind = %kind, error = %e, "Event stream rejected");
                break;
            }
            Some(Err(e)) => tracing::warn!(kind = %kind, error = %e, "Event stream error"),
        }
    }
    source.close();
}
