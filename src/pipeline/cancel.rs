//! Run-wide cancellation signal.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle that stops a run.
///
/// Every clone observes the same flag. Once cancelled, chunk pipelines that
/// are waiting for a permit, sleeping between retries or blocked on the
/// backend finish with [`crate::error::ChunkError::Cancelled`].
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot see a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
