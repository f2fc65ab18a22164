//! HttpBackend -- concrete [`Backend`] implementation for the hosted entity API.
//!
//! Collections live under `{base_url}/api/apps/{app_id}/entities/{Kind}`:
//!
//! - `GET    .../{Kind}?sort=&limit=&q=` -- list or filter
//! - `POST   .../{Kind}`                 -- create
//! - `PUT    .../{Kind}/{id}`            -- update
//! - `GET    .../{Kind}/events`          -- server-sent change events
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed when
//! building request headers.

use std::time::Duration;

use pawbook_core::backend::{Backend, Subscription};
use pawbook_types::config::BackendConfig;
use pawbook_types::entity::{EntityKind, Predicate, Record, SortKey};
use pawbook_types::error::BackendError;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use super::events::spawn_event_forwarder;

/// Header carrying the application API key.
const API_KEY_HEADER: &str = "api_key";

/// Hosted entity backend.
///
/// Not `Debug`: holds the API key.
pub struct HttpBackend {
    client: reqwest::Client,
    /// Long-lived event streams must not hit the request timeout.
    stream_client: reqwest::Client,
    base_url: String,
    app_id: String,
    api_key: Option<SecretString>,
    event_buffer: usize,
}

impl HttpBackend {
    /// Create a backend from configuration.
    ///
    /// `event_buffer` is the capacity of each subscription's channel.
    pub fn new(config: &BackendConfig, event_buffer: usize) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Connection(format!("failed to create HTTP client: {e}")))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BackendError::Connection(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            stream_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            api_key: config
                .api_key
                .as_ref()
                .map(|key| SecretString::from(key.clone())),
            event_buffer: event_buffer.max(1),
        })
    }

    /// Collection URL for an entity kind.
    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/api/apps/{}/entities/{}", self.base_url, self.app_id, kind)
    }

    fn record_url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}", self.collection_url(kind), id)
    }

    fn events_url(&self, kind: EntityKind) -> String {
        format!("{}/events", self.collection_url(kind))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key.expose_secret()),
            None => request,
        }
    }

    fn query_request(
        &self,
        kind: EntityKind,
        predicate: Option<&Predicate>,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Result<RequestBuilder, BackendError> {
        let mut query: Vec<(&str, String)> = vec![("sort", sort.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(predicate) = predicate.filter(|p| !p.is_empty()) {
            let q = serde_json::to_string(predicate)
                .map_err(|e| BackendError::Decode(format!("failed to encode query: {e}")))?;
            query.push(("q", q));
        }

        Ok(self.authorize(self.client.get(self.collection_url(kind)).query(&query)))
    }

    async fn fetch_records(&self, request: RequestBuilder) -> Result<Vec<Record>, BackendError> {
        let response = send(request).await?;
        response
            .json::<Vec<Record>>()
            .await
            .map_err(|e| BackendError::Decode(format!("failed to parse record list: {e}")))
    }

    async fn fetch_record(&self, request: RequestBuilder) -> Result<Record, BackendError> {
        let response = send(request).await?;
        response
            .json::<Record>()
            .await
            .map_err(|e| BackendError::Decode(format!("failed to parse record: {e}")))
    }
}

/// Send a request and turn non-success statuses into errors.
async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    let response = request
        .send()
        .await
        .map_err(|e| BackendError::Connection(format!("HTTP request failed: {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, "Backend error response");
    Err(status_error(status, body))
}

fn status_error(status: StatusCode, body: String) -> BackendError {
    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound,
        _ => BackendError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

impl Backend for HttpBackend {
    async fn list(
        &self,
        kind: EntityKind,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, BackendError> {
        let request = self.query_request(kind, None, sort, limit)?;
        self.fetch_records(request).await
    }

    async fn filter(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        sort: &SortKey,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, BackendError> {
        let request = self.query_request(kind, Some(predicate), sort, limit)?;
        self.fetch_records(request).await
    }

    async fn create(&self, kind: EntityKind, fields: Record) -> Result<Record, BackendError> {
        let request = self.authorize(self.client.post(self.collection_url(kind)).json(&fields));
        self.fetch_record(request).await
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        fields: Record,
    ) -> Result<Record, BackendError> {
        let request = self.authorize(self.client.put(self.record_url(kind, id)).json(&fields));
        self.fetch_record(request).await
    }

    fn subscribe(&self, kind: EntityKind) -> Result<Subscription, BackendError> {
        let request = self.authorize(
            self.stream_client
                .get(self.events_url(kind))
                .header(reqwest::header::ACCEPT, "text/event-stream"),
        );
        spawn_event_forwarder(kind, request, self.event_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            app_id: "paws-test".to_string(),
            api_key: Some("sk-test".to_string()),
            timeout_secs: 5,
        }
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn json_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn urls_follow_entity_layout() {
        let backend = HttpBackend::new(&config("https://paws.example.com/"), 16).unwrap();
        assert_eq!(
            backend.collection_url(EntityKind::Conversation),
            "https://paws.example.com/api/apps/paws-test/entities/Conversation"
        );
        assert_eq!(
            backend.record_url(EntityKind::Message, "m1"),
            "https://paws.example.com/api/apps/paws-test/entities/Message/m1"
        );
        assert_eq!(
            backend.events_url(EntityKind::Message),
            "https://paws.example.com/api/apps/paws-test/entities/Message/events"
        );
    }

    #[test]
    fn query_carries_sort_limit_and_predicate() {
        let backend = HttpBackend::new(&config("https://paws.example.com"), 16).unwrap();
        let predicate = Predicate::new().field_eq("conversation_id", "c1");
        let request = backend
            .query_request(
                EntityKind::Message,
                Some(&predicate),
                &SortKey::asc("created_date"),
                Some(20),
            )
            .unwrap()
            .build()
            .unwrap();

        let pairs: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("sort".to_string(), "created_date".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("q".to_string(), r#"{"conversation_id":"c1"}"#.to_string()),
            ]
        );
        assert_eq!(request.headers()[API_KEY_HEADER], "sk-test");
    }

    #[test]
    fn no_api_key_header_without_key() {
        let mut cfg = config("https://paws.example.com");
        cfg.api_key = None;
        let backend = HttpBackend::new(&cfg, 16).unwrap();
        let request = backend
            .query_request(EntityKind::Conversation, None, &SortKey::desc("last_message_at"), None)
            .unwrap()
            .build()
            .unwrap();
        assert!(request.headers().get(API_KEY_HEADER).is_none());
        assert_eq!(request.url().query(), Some("sort=-last_message_at"));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new()),
            BackendError::NotFound
        ));
        match status_error(StatusCode::SERVICE_UNAVAILABLE, "maintenance".to_string()) {
            BackendError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_decodes_records() {
        let body = json!([
            { "id": "c1", "participants": ["alice", "bob"], "last_message": "hi" }
        ])
        .to_string();
        let (base_url, server) = serve_once(json_response("200 OK", &body)).await;
        let backend = HttpBackend::new(&config(&base_url), 16).unwrap();

        let records = backend
            .list(EntityKind::Conversation, &SortKey::desc("last_message_at"), None)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "c1");

        let request = server.await.unwrap();
        assert!(request.starts_with(
            "GET /api/apps/paws-test/entities/Conversation?sort=-last_message_at HTTP/1.1"
        ));
        assert!(request.to_lowercase().contains("api_key: sk-test"));
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let (base_url, server) = serve_once(json_response("404 Not Found", "")).await;
        let backend = HttpBackend::new(&config(&base_url), 16).unwrap();

        let err = backend
            .update(EntityKind::Conversation, "missing", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound));

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /api/apps/paws-test/entities/Conversation/missing"));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let (base_url, _server) = serve_once(json_response("200 OK", r#"{"not":"a list"}"#)).await;
        let backend = HttpBackend::new(&config(&base_url), 16).unwrap();

        let err = backend
            .list(EntityKind::Message, &SortKey::asc("created_date"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(&config(&format!("http://{addr}")), 16).unwrap();
        let err = backend
            .create(EntityKind::Message, Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)));
    }

    #[test]
    fn subscribe_outside_runtime_fails_cleanly() {
        let backend = HttpBackend::new(&config("http://127.0.0.1:9"), 16).unwrap();
        let err = backend.subscribe(EntityKind::Message).unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)));
    }
}
