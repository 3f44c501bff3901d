//! Isolated browsing contexts.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::identifiers::BrowsingContextId;
use crate::protocol::{Command, TargetCommand};
use crate::transport::Connection;

// ============================================================================
// BrowsingContext
// ============================================================================

/// An isolated storage/cookie namespace inside the browser.
///
/// Disposed at most once: the first [`BrowsingContext::close`] disposes
/// the namespace and every target in it, subsequent calls are no-ops.
pub struct BrowsingContext {
    id: BrowsingContextId,
    connection: Arc<Connection>,
    open_contexts: Arc<Mutex<FxHashSet<BrowsingContextId>>>,
    closed: AtomicBool,
}

impl BrowsingContext {
    pub(crate) fn new(
        id: BrowsingContextId,
        connection: Arc<Connection>,
        open_contexts: Arc<Mutex<FxHashSet<BrowsingContextId>>>,
    ) -> Self {
        Self {
            id,
            connection,
            open_contexts,
            closed: AtomicBool::new(false),
        }
    }

    /// This context's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &BrowsingContextId {
        &self.id
    }

    /// Whether the context has been disposed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Disposes the context.
    ///
    /// Idempotent: double-close is a no-op. Disposal failures are
    /// cleanup failures and never surface to the caller.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.open_contexts.lock().remove(&self.id);

        let result = self
            .connection
            .send(
                Command::Target(TargetCommand::DisposeBrowserContext {
                    browser_context_id: self.id.clone(),
                }),
                None,
            )
            .await;
        if let Err(e) = result {
            warn!(context = %self.id, error = %e, "context disposal failed");
        }
    }
}

impl std::fmt::Debug for BrowsingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowsingContext")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::test_support::{ScriptedServer, reply};

    #[tokio::test]
    async fn test_double_close_disposes_once() {
        let disposals = Arc::new(Mutex::new(0u32));
        let server = ScriptedServer::spawn({
            let disposals = disposals.clone();
            move |call| {
                if call.method == "Target.disposeBrowserContext" {
                    *disposals.lock() += 1;
                }
                vec![reply(call.id, json!({}))]
            }
        })
        .await;

        let connection = Connection::connect(&server.url()).await.expect("connect");
        let open = Arc::new(Mutex::new(FxHashSet::default()));
        open.lock().insert(BrowsingContextId::new("C1"));
        let context = BrowsingContext::new(BrowsingContextId::new("C1"), connection, open.clone());

        context.close().await;
        context.close().await;

        assert!(context.is_closed());
        assert_eq!(*disposals.lock(), 1);
        assert!(open.lock().is_empty());
    }
}
