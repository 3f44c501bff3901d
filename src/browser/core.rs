//! Browser: owns the transport and the supervised process.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::identifiers::{BrowsingContextId, SessionId, TargetId};
use crate::policy::NavigationPolicy;
use crate::protocol::{BrowserCommand, Command, TargetCommand};
use crate::transport::Connection;

use super::context::BrowsingContext;
use super::page::Page;

// ============================================================================
// Types
// ============================================================================

/// Best-effort teardown work run during [`Browser::close`].
pub type CleanupFn = Box<dyn FnOnce() + Send>;

#[derive(Deserialize)]
struct CreateTargetResult {
    #[serde(rename = "targetId")]
    target_id: TargetId,
}

#[derive(Deserialize)]
struct AttachResult {
    #[serde(rename = "sessionId")]
    session_id: SessionId,
}

#[derive(Deserialize)]
struct CreateContextResult {
    #[serde(rename = "browserContextId")]
    browser_context_id: BrowsingContextId,
}

// ============================================================================
// Browser
// ============================================================================

/// One launched browser instance.
///
/// Owns the shared [`Connection`] and the supervised process handle,
/// hands out isolated [`BrowsingContext`]s and [`Page`]s, and
/// orchestrates shutdown.
pub struct Browser {
    connection: Arc<Connection>,
    process: Mutex<Option<Child>>,
    open_contexts: Arc<Mutex<FxHashSet<BrowsingContextId>>>,
    cleanup_tasks: Mutex<Vec<CleanupFn>>,
    sink: Arc<dyn EventSink>,
    policy: NavigationPolicy,
}

impl Browser {
    pub(crate) fn assemble(
        connection: Arc<Connection>,
        process: Option<Child>,
        sink: Arc<dyn EventSink>,
        policy: NavigationPolicy,
    ) -> Self {
        Self {
            connection,
            process: Mutex::new(process),
            open_contexts: Arc::new(Mutex::new(FxHashSet::default())),
            cleanup_tasks: Mutex::new(Vec::new()),
            sink,
            policy,
        }
    }

    /// The shared connection, for advanced callers.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Registers best-effort teardown work for [`Browser::close`].
    pub fn register_cleanup(&self, task: CleanupFn) {
        self.cleanup_tasks.lock().push(task);
    }

    /// Creates an isolated storage/cookie namespace.
    ///
    /// # Errors
    ///
    /// Propagates protocol and transport errors.
    pub async fn new_browsing_context(&self) -> Result<BrowsingContext> {
        let result = self
            .connection
            .send(Command::Target(TargetCommand::CreateBrowserContext), None)
            .await?;
        let created: CreateContextResult = serde_json::from_value(result)?;

        self.open_contexts
            .lock()
            .insert(created.browser_context_id.clone());
        debug!(context = %created.browser_context_id, "browsing context created");

        Ok(BrowsingContext::new(
            created.browser_context_id,
            self.connection.clone(),
            self.open_contexts.clone(),
        ))
    }

    /// Creates a target, attaches to it, and wraps the session in an
    /// initialized [`Page`].
    ///
    /// When `context` is given the target lives in that isolated
    /// namespace.
    ///
    /// # Errors
    ///
    /// - [`Error::State`] if `context` was already closed.
    /// - Protocol and transport errors otherwise.
    pub async fn new_page(&self, context: Option<&BrowsingContext>) -> Result<Page> {
        let browser_context_id = match context {
            Some(context) if context.is_closed() => {
                return Err(Error::state("browsing context already closed"));
            }
            Some(context) => Some(context.id().clone()),
            None => None,
        };

        let created = self
            .connection
            .send(
                Command::Target(TargetCommand::CreateTarget {
                    url: "about:blank".to_string(),
                    browser_context_id,
                }),
                None,
            )
            .await?;
        let created: CreateTargetResult = serde_json::from_value(created)?;

        let attached = self
            .connection
            .send(
                Command::Target(TargetCommand::AttachToTarget {
                    target_id: created.target_id.clone(),
                    flatten: true,
                }),
                None,
            )
            .await?;
        let attached: AttachResult = serde_json::from_value(attached)?;

        let session = self.connection.create_session(attached.session_id);
        let page = Page::new(session, self.sink.clone(), self.policy);
        page.initialize().await?;
        debug!(target = %created.target_id, "page ready");
        Ok(page)
    }

    /// Shuts the instance down.
    ///
    /// Disposes every still-open browsing context, requests graceful
    /// shutdown, closes the transport, force-terminates the process if
    /// still alive, then runs every registered cleanup task. All
    /// cleanup failures are swallowed; they never mask the shutdown.
    pub async fn close(&self) {
        let contexts: Vec<_> = self.open_contexts.lock().drain().collect();
        for context_id in contexts {
            let result = self
                .connection
                .send(
                    Command::Target(TargetCommand::DisposeBrowserContext {
                        browser_context_id: context_id.clone(),
                    }),
                    None,
                )
                .await;
            if let Err(e) = result {
                warn!(context = %context_id, error = %e, "context disposal failed");
            }
        }

        if let Err(e) = self
            .connection
            .send(Command::Browser(BrowserCommand::Close), None)
            .await
        {
            warn!(error = %e, "graceful shutdown request failed");
        }

        self.connection.close();

        if let Some(mut child) = self.process.lock().take()
            && child.try_wait().ok().flatten().is_none()
            && let Err(e) = child.start_kill()
        {
            warn!(error = %e, "process kill failed");
        }

        let tasks: Vec<_> = self.cleanup_tasks.lock().drain(..).collect();
        for task in tasks {
            task();
        }
        debug!("browser closed");
    }
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("open_contexts", &self.open_contexts.lock().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::events::RecordingSink;
    use crate::test_support::{ScriptedCall, ScriptedServer, reply};

    fn browser_handler(call: ScriptedCall) -> Vec<Value> {
        let response = match call.method.as_str() {
            "Target.createTarget" => json!({"targetId": "T1"}),
            "Target.attachToTarget" => json!({"sessionId": "S1"}),
            "Target.createBrowserContext" => json!({"browserContextId": "C1"}),
            "Page.getFrameTree" => {
                json!({"frameTree": {"frame": {"id": "F1", "url": "about:blank"}}})
            }
            _ => json!({}),
        };
        vec![reply(call.id, response)]
    }

    async fn scripted_browser<H>(handler: H) -> (Browser, ScriptedServer)
    where
        H: FnMut(ScriptedCall) -> Vec<Value> + Send + 'static,
    {
        let server = ScriptedServer::spawn(handler).await;
        let connection = Connection::connect(&server.url()).await.expect("connect");
        let browser = Browser::assemble(
            connection,
            None,
            Arc::new(RecordingSink::new()),
            NavigationPolicy::default(),
        );
        (browser, server)
    }

    #[tokio::test]
    async fn test_new_page_attaches_flat_session() {
        let (browser, _server) = scripted_browser(|call| {
            if call.method == "Target.attachToTarget" {
                assert_eq!(call.params["flatten"], true);
                assert_eq!(call.params["targetId"], "T1");
            }
            browser_handler(call)
        })
        .await;

        let page = browser.new_page(None).await.expect("page");
        assert_eq!(page.main_frame().expect("main").id().as_str(), "F1");
    }

    #[tokio::test]
    async fn test_new_page_in_context_scopes_target() {
        let (browser, _server) = scripted_browser(|call| {
            if call.method == "Target.createTarget" {
                assert_eq!(call.params["browserContextId"], "C1");
            }
            browser_handler(call)
        })
        .await;

        let context = browser.new_browsing_context().await.expect("context");
        browser.new_page(Some(&context)).await.expect("page");
    }

    #[tokio::test]
    async fn test_new_page_rejects_closed_context() {
        let (browser, _server) = scripted_browser(browser_handler).await;

        let context = browser.new_browsing_context().await.expect("context");
        context.close().await;

        let err = browser.new_page(Some(&context)).await.expect_err("closed");
        assert!(matches!(err, Error::State { .. }));
    }

    #[tokio::test]
    async fn test_close_disposes_contexts_and_runs_cleanups() {
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let (browser, _server) = scripted_browser({
            let disposed = disposed.clone();
            move |call| {
                if call.method == "Target.disposeBrowserContext" {
                    disposed.lock().push(
                        call.params["browserContextId"]
                            .as_str()
                            .unwrap_or("")
                            .to_string(),
                    );
                }
                browser_handler(call)
            }
        })
        .await;

        let _context = browser.new_browsing_context().await.expect("context");
        let ran = Arc::new(AtomicBool::new(false));
        browser.register_cleanup({
            let ran = ran.clone();
            Box::new(move || ran.store(true, Ordering::SeqCst))
        });

        browser.close().await;

        assert_eq!(disposed.lock().as_slice(), ["C1"]);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_close_survives_failing_graceful_shutdown() {
        // No response to Browser.close: the connection simply goes away.
        let (browser, server) = scripted_browser(|call| {
            if call.method == "Browser.close" {
                vec![]
            } else {
                browser_handler(call)
            }
        })
        .await;

        drop(server);
        browser.close().await;
    }
}
