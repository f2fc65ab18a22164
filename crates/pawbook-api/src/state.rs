//! Application state wiring the messaging components together.
//!
//! The stores are generic over `Backend`; AppState pins them to the hosted
//! `HttpBackend` for normal commands and to `MemoryBackend` for the demo.

use std::sync::Arc;

use anyhow::Context;
use pawbook_core::backend::Backend;
use pawbook_core::conversation::ConversationStore;
use pawbook_core::message::MessageStream;
use pawbook_core::outbound::OutboundQueue;
use pawbook_core::sync::SyncScheduler;
use pawbook_infra::config::load_config;
use pawbook_infra::filesystem::resolve_data_dir;
use pawbook_infra::http::HttpBackend;
use pawbook_infra::memory::MemoryBackend;
use pawbook_types::config::PawbookConfig;

/// Shared state handed to every command.
pub struct AppState<B: Backend + 'static = HttpBackend> {
    pub backend: Arc<B>,
    pub conversations: Arc<ConversationStore<B>>,
    pub messages: Arc<MessageStream<B>>,
    pub outbound: Arc<OutboundQueue<B>>,
    pub config: PawbookConfig,
}

impl AppState<HttpBackend> {
    /// Load configuration and connect the hosted backend adapter.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;
        tracing::debug!(data_dir = %data_dir.display(), "Loaded configuration");
        let backend = HttpBackend::new(&config.backend, config.sync.event_buffer)
            .context("failed to create backend client")?;
        tracing::debug!(base_url = %config.backend.base_url, "Using hosted backend");
        Ok(Self::with_backend(Arc::new(backend), config))
    }
}

impl AppState<MemoryBackend> {
    /// State backed by an in-process backend, for the demo.
    pub fn in_memory(config: PawbookConfig) -> Self {
        let backend = MemoryBackend::with_event_buffer(config.sync.event_buffer);
        Self::with_backend(Arc::new(backend), config)
    }
}

impl<B: Backend + 'static> AppState<B> {
    /// Wire the stores over an existing backend.
    pub fn with_backend(backend: Arc<B>, config: PawbookConfig) -> Self {
        let conversations = Arc::new(
            ConversationStore::new(backend.clone())
                .with_preview_max_chars(config.sync.preview_max_chars),
        );
        let messages = Arc::new(MessageStream::new(conversations.clone()));
        let outbound = Arc::new(OutboundQueue::new(messages.clone()));
        Self {
            backend,
            conversations,
            messages,
            outbound,
            config,
        }
    }

    /// A scheduler over this state's stores, using the configured cadence.
    pub fn scheduler(&self) -> SyncScheduler<B> {
        SyncScheduler::new(self.messages.clone(), self.config.sync.clone())
    }
}
