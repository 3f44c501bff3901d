//! Selector-bound handle over one frame.
//!
//! A [`Locator`] captures a frame, a selector, and resolution options
//! once, so repeated interactions with the same element do not repeat
//! the selector at every call site. Nothing is resolved at
//! construction: every method re-resolves the selector at call time,
//! so a locator built before its element appears still works.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;

use super::frame::{ClickOptions, Frame, SelectorOptions, TypeOptions};

// ============================================================================
// Locator
// ============================================================================

/// A frame, a selector, and resolution options bound together.
#[derive(Debug, Clone)]
pub struct Locator {
    frame: Frame,
    selector: String,
    options: SelectorOptions,
}

impl Locator {
    pub(crate) fn new(frame: Frame, selector: &str, options: SelectorOptions) -> Self {
        Self {
            frame,
            selector: selector.to_string(),
            options,
        }
    }

    /// The selector this locator resolves.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// The frame this locator resolves in.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// [`Frame::click`] on the bound selector.
    pub async fn click(&self, timeout_ms: Option<u64>) -> Result<()> {
        self.frame
            .click(&self.selector, self.click_options(timeout_ms))
            .await
    }

    /// [`Frame::dblclick`] on the bound selector.
    pub async fn dblclick(&self, timeout_ms: Option<u64>) -> Result<()> {
        self.frame
            .dblclick(&self.selector, self.click_options(timeout_ms))
            .await
    }

    /// [`Frame::type_text`] on the bound selector.
    pub async fn type_text(&self, text: &str, timeout_ms: Option<u64>) -> Result<()> {
        let options = TypeOptions {
            timeout_ms,
            pierce_shadow_dom: self.options.pierce_shadow_dom,
            sensitive: false,
        };
        self.frame.type_text(&self.selector, text, options).await
    }

    /// [`Frame::exists`] on the bound selector.
    pub async fn exists(&self) -> Result<bool> {
        self.frame.exists(&self.selector, self.options).await
    }

    /// [`Frame::text`] on the bound selector.
    pub async fn text(&self) -> Result<Option<String>> {
        self.frame.text(&self.selector, self.options).await
    }

    fn click_options(&self, timeout_ms: Option<u64>) -> ClickOptions {
        ClickOptions {
            timeout_ms,
            pierce_shadow_dom: self.options.pierce_shadow_dom,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::events::RecordingSink;
    use crate::identifiers::{FrameId, SessionId};
    use crate::test_support::{ScriptedCall, ScriptedServer, reply};
    use crate::transport::Connection;

    async fn scripted_locator<H>(
        handler: H,
        selector: &str,
        options: SelectorOptions,
    ) -> (Locator, ScriptedServer)
    where
        H: FnMut(ScriptedCall) -> Vec<Value> + Send + 'static,
    {
        let server = ScriptedServer::spawn(handler).await;
        let connection = Connection::connect(&server.url()).await.expect("connect");
        let session = connection.create_session(SessionId::new("S1"));
        let frame = Frame::new(
            FrameId::new("F1"),
            session,
            Arc::new(RecordingSink::new()),
        );
        (Locator::new(frame, selector, options), server)
    }

    #[tokio::test]
    async fn test_locator_resolves_at_call_time() {
        // The element is absent for the first read and present for the
        // second; the same locator observes both without rebuilding.
        let (locator, _server) = scripted_locator(
            {
                let mut reads = 0;
                move |call| match call.method.as_str() {
                    "Runtime.evaluate" => {
                        reads += 1;
                        let result = if reads == 1 {
                            json!({"result": {"subtype": "null"}})
                        } else {
                            json!({"result": {"value": "ready"}})
                        };
                        vec![reply(call.id, result)]
                    }
                    _ => vec![reply(call.id, json!({}))],
                }
            },
            "#status",
            SelectorOptions::default(),
        )
        .await;

        assert_eq!(locator.text().await.expect("first read"), None);
        assert_eq!(
            locator.text().await.expect("second read"),
            Some("ready".to_string())
        );
    }

    #[tokio::test]
    async fn test_locator_click_dispatches_mouse_events() {
        let mouse_events = Arc::new(Mutex::new(0u32));
        let (locator, _server) = scripted_locator(
            {
                let mouse_events = mouse_events.clone();
                move |call| match call.method.as_str() {
                    "Runtime.evaluate" => vec![reply(
                        call.id,
                        json!({"result": {"value": {
                            "x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0,
                            "visible": true
                        }}}),
                    )],
                    "Input.dispatchMouseEvent" => {
                        *mouse_events.lock() += 1;
                        vec![reply(call.id, json!({}))]
                    }
                    other => panic!("unexpected method {other}"),
                }
            },
            "#submit",
            SelectorOptions::default(),
        )
        .await;

        locator.click(None).await.expect("click");
        assert_eq!(*mouse_events.lock(), 3);
    }

    #[tokio::test]
    async fn test_locator_carries_shadow_piercing_into_actions() {
        let scripts = Arc::new(Mutex::new(Vec::new()));
        let (locator, _server) = scripted_locator(
            {
                let scripts = scripts.clone();
                move |call| match call.method.as_str() {
                    "Runtime.evaluate" => {
                        scripts
                            .lock()
                            .push(call.params["expression"].as_str().unwrap_or("").to_string());
                        vec![reply(call.id, json!({"result": {"subtype": "null"}}))]
                    }
                    _ => vec![reply(call.id, json!({}))],
                }
            },
            "#inner",
            SelectorOptions::pierced(),
        )
        .await;

        assert!(!locator.exists().await.expect("exists"));
        assert!(scripts.lock()[0].contains("queryDeep"));
    }
}
