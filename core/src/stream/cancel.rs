//! External cancellation for suspending operations.

use std::future::Future;
use std::sync::Arc;

use futures::future::{self, Either};
use futures_intrusive::sync::ManualResetEvent;

use crate::types::StreamError;

/// Cloneable cancellation signal shared between a caller and the operation it
/// may abort. Once cancelled it stays cancelled.
#[derive(Clone)]
pub struct CancelToken {
    event: Arc<ManualResetEvent>,
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            event: Arc::new(ManualResetEvent::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.event.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.event.is_set()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        self.event.wait().await
    }
}

/// Run `op` until it finishes or `token` fires.
///
/// `op` is dropped at its current suspension point on cancellation, so the
/// adapters only mutate shared state between suspension points.
pub async fn with_cancel<T, F>(token: &CancelToken, op: F) -> Result<T, StreamError>
where
    F: Future<Output = Result<T, StreamError>>,
{
    if token.is_cancelled() {
        return Err(StreamError::Cancelled);
    }

    let cancelled = token.cancelled();
    futures::pin_mut!(op);
    futures::pin_mut!(cancelled);

    match future::select(op, cancelled).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(StreamError::Cancelled),
    }
}
