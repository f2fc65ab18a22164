//! Cancellable task ownership.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A spawned task tied to a cancellation token.
///
/// `shutdown` cancels and waits for the task to finish; dropping the scope
/// cancels and aborts it without waiting.
pub(crate) struct TaskScope {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TaskScope {
    pub(crate) fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(task(token.clone()));
        Self {
            token,
            handle: Some(handle),
        }
    }

    pub(crate) async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Sync task panicked");
                }
            }
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
