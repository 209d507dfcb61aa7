//! Cooperative, hierarchical cancellation.
//!
//! Cancelling a token cancels every token derived from it with
//! [`CancelToken::child`]; cancelling a child leaves the parent untouched.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<bool>,
    parent: Option<CancelToken>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<CancelToken>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner { tx, parent }),
        }
    }

    /// New token cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    pub fn cancel(&self) {
        self.inner.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.tx.borrow()
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
    }

    /// Resolves once this token or any ancestor is cancelled.
    pub fn cancelled(&self) -> BoxFuture<'static, ()> {
        let token = self.clone();
        async move {
            let mut rx = token.inner.tx.subscribe();
            let own = async {
                // The sender lives as long as `token`, so this only returns on cancel.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            };
            match &token.inner.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = own => {}
                        _ = parent.cancelled() => {}
                    }
                }
                None => own.await,
            }
        }
        .boxed()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
