//! Per-frame read predicates and actions.
//!
//! A [`Frame`] pairs the frame's tracked metadata (id, url, parent,
//! bound execution context) with the session it talks through. Reads
//! resolve the selector remotely and yield `None` for a missing
//! element, never an error; callers interpret the null according to
//! their own semantics. Actions that target a visible element poll
//! until the element measures a non-zero, unhidden box, scrolling it
//! into view on each measurement.
//!
//! Sensitive variants behave identically to their base operation; the
//! only difference is the `sensitive` flag on the emitted events, so an
//! external sink may redact the selector or value. The frame itself
//! redacts nothing.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::events::{EventSink, OperationSpan};
use crate::identifiers::{ExecutionContextId, FrameId};
use crate::protocol::{Command, InputCommand, RuntimeCommand};
use crate::transport::Session;
use crate::wait::{DEFAULT_TIMEOUT_MS, WaitOptions, wait_for};

use super::dom_script;
use super::selector::ParsedSelector;

// ============================================================================
// Options
// ============================================================================

/// Selector resolution options shared by reads and assertions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorOptions {
    /// Resolve the selector through nested shadow roots.
    pub pierce_shadow_dom: bool,
}

impl SelectorOptions {
    /// Options with shadow piercing enabled.
    #[inline]
    #[must_use]
    pub const fn pierced() -> Self {
        Self {
            pierce_shadow_dom: true,
        }
    }
}

/// Options for click-family actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickOptions {
    /// Overall deadline for the visibility wait; default 30s.
    pub timeout_ms: Option<u64>,
    /// Resolve the selector through nested shadow roots.
    pub pierce_shadow_dom: bool,
}

/// Options for text-entry actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeOptions {
    /// Overall deadline for the visibility wait; default 30s.
    pub timeout_ms: Option<u64>,
    /// Resolve the selector through nested shadow roots.
    pub pierce_shadow_dom: bool,
    /// Flag emitted events as sensitive.
    pub sensitive: bool,
}

// ============================================================================
// Remote Values
// ============================================================================

/// Handle to a remote element obtained by a query.
///
/// Remote objects are owned by the browser; every handle must be given
/// back via [`Frame::release`] once the caller is done with it.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    /// Remote object id.
    pub object_id: String,
    /// Context the element was resolved in.
    pub context_id: Option<ExecutionContextId>,
}

/// Measured element geometry.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ElementBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Non-zero box, not hidden by visibility/display/opacity.
    pub visible: bool,
}

impl ElementBox {
    fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

// ============================================================================
// Frame
// ============================================================================

#[derive(Debug, Clone, Default)]
pub(crate) struct FrameMeta {
    pub name: Option<String>,
    pub url: Option<String>,
    pub parent_id: Option<FrameId>,
    pub execution_context_id: Option<ExecutionContextId>,
}

/// One frame of a page, with its operations.
///
/// Cheap to clone; clones share the tracked metadata, which the owning
/// page mutates as frame and context events arrive.
#[derive(Clone)]
pub struct Frame {
    id: FrameId,
    meta: Arc<Mutex<FrameMeta>>,
    session: Session,
    sink: Arc<dyn EventSink>,
}

impl Frame {
    pub(crate) fn new(id: FrameId, session: Session, sink: Arc<dyn EventSink>) -> Self {
        Self {
            id,
            meta: Arc::new(Mutex::new(FrameMeta::default())),
            session,
            sink,
        }
    }

    /// This frame's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &FrameId {
        &self.id
    }

    /// The frame's name attribute, when known.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.meta.lock().name.clone()
    }

    /// The frame's current document URL, when known.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.meta.lock().url.clone()
    }

    /// The parent frame id; `None` on the main frame.
    #[must_use]
    pub fn parent_id(&self) -> Option<FrameId> {
        self.meta.lock().parent_id.clone()
    }

    /// The bound execution context, when one exists.
    #[must_use]
    pub fn execution_context(&self) -> Option<ExecutionContextId> {
        self.meta.lock().execution_context_id
    }

    pub(crate) fn set_navigation_meta(
        &self,
        name: Option<String>,
        url: Option<String>,
        parent_id: Option<FrameId>,
    ) {
        let mut meta = self.meta.lock();
        meta.name = name;
        meta.url = url;
        meta.parent_id = parent_id;
    }

    pub(crate) fn set_parent(&self, parent_id: Option<FrameId>) {
        self.meta.lock().parent_id = parent_id;
    }

    pub(crate) fn set_execution_context(&self, context_id: Option<ExecutionContextId>) {
        self.meta.lock().execution_context_id = context_id;
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluates an expression in this frame's bound context, awaiting
    /// a returned promise, and yields the result by value.
    ///
    /// # Errors
    ///
    /// Propagates protocol and transport errors.
    pub async fn evaluate(&self, expression: impl Into<String>) -> Result<Value> {
        let result = self
            .session
            .send(Command::Runtime(RuntimeCommand::Evaluate {
                expression: expression.into(),
                return_by_value: true,
                await_promise: true,
                context_id: self.execution_context(),
            }))
            .await?;
        Ok(result["result"]["value"].clone())
    }

    async fn eval_by_value(&self, expression: String) -> Result<Value> {
        let result = self
            .session
            .send(Command::Runtime(RuntimeCommand::Evaluate {
                expression,
                return_by_value: true,
                await_promise: false,
                context_id: self.execution_context(),
            }))
            .await?;
        Ok(result["result"]["value"].clone())
    }

    async fn eval_by_handle(&self, expression: String) -> Result<Value> {
        self.session
            .send(Command::Runtime(RuntimeCommand::Evaluate {
                expression,
                return_by_value: false,
                await_promise: false,
                context_id: self.execution_context(),
            }))
            .await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Resolves the first element matching `selector`.
    ///
    /// The returned handle must be [`Frame::release`]d.
    pub async fn query(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        let parsed = ParsedSelector::classify(selector);
        self.query_parsed(&parsed, options).await
    }

    /// Resolves the first element matching `selector` as a path query,
    /// bypassing classification.
    pub async fn query_path(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        let parsed = ParsedSelector::path_query(selector);
        self.query_parsed(&parsed, options).await
    }

    async fn query_parsed(
        &self,
        parsed: &ParsedSelector,
        options: SelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        let response = self
            .eval_by_handle(dom_script::query_first(parsed, options.pierce_shadow_dom))
            .await?;

        let result = &response["result"];
        if result["subtype"] == "null" {
            return Ok(None);
        }
        Ok(result["objectId"].as_str().map(|object_id| ElementHandle {
            object_id: object_id.to_string(),
            context_id: self.execution_context(),
        }))
    }

    /// Resolves every element matching `selector`.
    ///
    /// Each returned handle must be [`Frame::release`]d; the remote
    /// array holding them is released here before returning.
    pub async fn query_all(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Vec<ElementHandle>> {
        let parsed = ParsedSelector::classify(selector);
        self.query_all_parsed(&parsed, options).await
    }

    /// Path-query variant of [`Frame::query_all`], bypassing classification.
    pub async fn query_all_path(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Vec<ElementHandle>> {
        let parsed = ParsedSelector::path_query(selector);
        self.query_all_parsed(&parsed, options).await
    }

    async fn query_all_parsed(
        &self,
        parsed: &ParsedSelector,
        options: SelectorOptions,
    ) -> Result<Vec<ElementHandle>> {
        let response = self
            .eval_by_handle(dom_script::query_all(parsed, options.pierce_shadow_dom))
            .await?;

        let Some(array_id) = response["result"]["objectId"].as_str().map(str::to_string) else {
            return Ok(Vec::new());
        };

        let properties = self
            .session
            .send(Command::Runtime(RuntimeCommand::GetProperties {
                object_id: array_id.clone(),
                own_properties: true,
            }))
            .await;

        // The array handle is released whether or not unpacking worked.
        self.release_object(&array_id).await;
        let properties = properties?;

        let mut handles = Vec::new();
        if let Some(entries) = properties["result"].as_array() {
            for entry in entries {
                let is_index = entry["name"]
                    .as_str()
                    .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()));
                if !is_index {
                    continue;
                }
                if let Some(object_id) = entry["value"]["objectId"].as_str() {
                    handles.push(ElementHandle {
                        object_id: object_id.to_string(),
                        context_id: self.execution_context(),
                    });
                }
            }
        }
        Ok(handles)
    }

    /// Gives a remote element handle back to the browser.
    ///
    /// Release failures are ignored; the browser reclaims handles when
    /// their context goes away regardless.
    pub async fn release(&self, handle: ElementHandle) {
        self.release_object(&handle.object_id).await;
    }

    async fn release_object(&self, object_id: &str) {
        let _ = self
            .session
            .send(Command::Runtime(RuntimeCommand::ReleaseObject {
                object_id: object_id.to_string(),
            }))
            .await;
    }

    // ========================================================================
    // Read Predicates
    // ========================================================================

    /// Whether any element currently matches `selector`.
    pub async fn exists(&self, selector: &str, options: SelectorOptions) -> Result<bool> {
        match self.query(selector, options).await? {
            Some(handle) => {
                self.release(handle).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether the first match measures a visible, non-zero box.
    pub async fn is_visible(&self, selector: &str, options: SelectorOptions) -> Result<bool> {
        let parsed = ParsedSelector::classify(selector);
        let element_box = self.resolve_element_box(&parsed, options.pierce_shadow_dom).await?;
        Ok(element_box.is_some_and(|b| b.visible))
    }

    /// The first match's text content; `None` if no element matches.
    pub async fn text(&self, selector: &str, options: SelectorOptions) -> Result<Option<String>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::text(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sensitive variant of [`Frame::text`]: identical read, events
    /// flagged sensitive.
    pub async fn text_secure(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<String>> {
        let _span = self.action_span("text", selector, true);
        self.text(selector, options).await
    }

    /// The first match's form value; `None` if no element matches.
    pub async fn value(&self, selector: &str, options: SelectorOptions) -> Result<Option<String>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::value(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sensitive variant of [`Frame::value`].
    pub async fn value_secure(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<String>> {
        let _span = self.action_span("value", selector, true);
        self.value(selector, options).await
    }

    /// One attribute of the first match; `None` if element or attribute
    /// is absent.
    pub async fn attribute(
        &self,
        selector: &str,
        name: &str,
        options: SelectorOptions,
    ) -> Result<Option<String>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::attribute(&parsed, options.pierce_shadow_dom, name))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// The first match's class list; `None` if no element matches.
    pub async fn classes(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<Vec<String>>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::classes(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// One computed style property of the first match.
    pub async fn css(
        &self,
        selector: &str,
        property: &str,
        options: SelectorOptions,
    ) -> Result<Option<String>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::css(&parsed, options.pierce_shadow_dom, property))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the first match is enabled; `None` if no element matches.
    pub async fn is_enabled(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<bool>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::is_enabled(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the first match is checked; `None` when no element
    /// matches or the element has no checked notion.
    pub async fn is_checked(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<bool>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::is_checked(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the first match accepts edits; `None` if no element matches.
    pub async fn is_editable(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<bool>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::is_editable(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the first match holds focus; `None` if no element matches.
    pub async fn has_focus(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<bool>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::has_focus(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the first match intersects the viewport (`fully`: fits
    /// entirely inside it); `None` if no element matches.
    pub async fn is_in_viewport(
        &self,
        selector: &str,
        options: SelectorOptions,
        fully: bool,
    ) -> Result<Option<bool>> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::is_in_viewport(
                &parsed,
                options.pierce_shadow_dom,
                fully,
            ))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// How many elements match `selector`.
    pub async fn count(&self, selector: &str, options: SelectorOptions) -> Result<u64> {
        let parsed = ParsedSelector::classify(selector);
        let value = self
            .eval_by_value(dom_script::count(&parsed, options.pierce_shadow_dom))
            .await?;
        Ok(value.as_u64().unwrap_or(0))
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Clicks the first match at its box center once it is visible.
    ///
    /// # Errors
    ///
    /// [`crate::Error::WaitTimeout`] if the element never becomes
    /// visible and sized within the deadline.
    pub async fn click(&self, selector: &str, options: ClickOptions) -> Result<()> {
        self.perform_click(selector, options, false).await
    }

    /// Clicks twice: the click sequence plus a second press/release
    /// pair marked as the second click of a double-click gesture.
    pub async fn dblclick(&self, selector: &str, options: ClickOptions) -> Result<()> {
        self.perform_click(selector, options, true).await
    }

    async fn perform_click(
        &self,
        selector: &str,
        options: ClickOptions,
        double: bool,
    ) -> Result<()> {
        let action = if double { "dblclick" } else { "click" };
        let _span = self.action_span(action, selector, false);

        let parsed = ParsedSelector::classify(selector);
        let element_box = self
            .wait_for_visible_box(&parsed, options.pierce_shadow_dom, options.timeout_ms, action)
            .await?;

        let (x, y) = element_box.center();
        self.session
            .send(Command::Input(InputCommand::mouse_moved(x, y)))
            .await?;
        self.session
            .send(Command::Input(InputCommand::mouse_pressed(x, y, 1)))
            .await?;
        self.session
            .send(Command::Input(InputCommand::mouse_released(x, y, 1)))
            .await?;

        if double {
            self.session
                .send(Command::Input(InputCommand::mouse_moved(x, y)))
                .await?;
            self.session
                .send(Command::Input(InputCommand::mouse_pressed(x, y, 2)))
                .await?;
            self.session
                .send(Command::Input(InputCommand::mouse_released(x, y, 2)))
                .await?;
        }

        debug!(selector, frame = %self.id, action, "pointer action done");
        Ok(())
    }

    /// Waits for visibility, focuses the element, then inserts `text`
    /// as one text-insertion event (not per-keystroke).
    pub async fn type_text(&self, selector: &str, text: &str, options: TypeOptions) -> Result<()> {
        let _span = self.action_span("type", selector, options.sensitive);

        let parsed = ParsedSelector::classify(selector);
        self.wait_for_visible_box(&parsed, options.pierce_shadow_dom, options.timeout_ms, "type")
            .await?;

        self.eval_by_value(dom_script::focus(&parsed, options.pierce_shadow_dom))
            .await?;
        self.session
            .send(Command::Input(InputCommand::InsertText {
                text: text.to_string(),
            }))
            .await?;
        Ok(())
    }

    /// [`Frame::type_text`] with events flagged sensitive.
    pub async fn type_secure(
        &self,
        selector: &str,
        text: &str,
        options: TypeOptions,
    ) -> Result<()> {
        self.type_text(
            selector,
            text,
            TypeOptions {
                sensitive: true,
                ..options
            },
        )
        .await
    }

    /// Fast path for form controls: polls until an input/textarea/select
    /// matching `selector` (with `>>>` resolved inline) exists, sets its
    /// value directly, and synthesizes `input` + `change` events.
    pub async fn fill_input(
        &self,
        selector: &str,
        value: &str,
        timeout_ms: Option<u64>,
    ) -> Result<()> {
        let _span = self.action_span("fillInput", selector, false);

        let script = dom_script::fill_input(selector, value);
        let frame = self.clone();
        wait_for(
            move || {
                let frame = frame.clone();
                let script = script.clone();
                async move {
                    let filled = frame.eval_by_value(script).await?;
                    Ok(if filled.as_bool() == Some(true) {
                        Some(())
                    } else {
                        None
                    })
                }
            },
            WaitOptions::described(format!("fillInput {selector}"))
                .timeout_ms(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
        )
        .await
    }

    /// Selects an option by value on a matching `<select>`.
    ///
    /// Returns whether a select element was found and updated.
    pub async fn select_option(
        &self,
        selector: &str,
        value: &str,
        options: SelectorOptions,
    ) -> Result<bool> {
        let _span = self.action_span("selectOption", selector, false);
        let parsed = ParsedSelector::classify(selector);
        let result = self
            .eval_by_value(dom_script::select_option(
                &parsed,
                options.pierce_shadow_dom,
                value,
            ))
            .await?;
        Ok(result.as_bool() == Some(true))
    }

    /// Attaches an in-memory file to a matching file input.
    ///
    /// Returns whether an input element was found and populated.
    pub async fn set_file_input(
        &self,
        selector: &str,
        file_name: &str,
        contents: &str,
        mime_type: Option<&str>,
        options: SelectorOptions,
    ) -> Result<bool> {
        let _span = self.action_span("setFileInput", selector, false);
        let parsed = ParsedSelector::classify(selector);
        let result = self
            .eval_by_value(dom_script::set_file_input(
                &parsed,
                options.pierce_shadow_dom,
                file_name,
                contents,
                mime_type.unwrap_or("text/plain"),
            ))
            .await?;
        Ok(result.as_bool() == Some(true))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn resolve_element_box(
        &self,
        parsed: &ParsedSelector,
        pierce: bool,
    ) -> Result<Option<ElementBox>> {
        let value = self
            .eval_by_value(dom_script::element_box(parsed, pierce))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value).ok())
    }

    async fn wait_for_visible_box(
        &self,
        parsed: &ParsedSelector,
        pierce: bool,
        timeout_ms: Option<u64>,
        action: &str,
    ) -> Result<ElementBox> {
        let frame = self.clone();
        let parsed = parsed.clone();
        let description = format!("{action} {}", parsed.value);
        wait_for(
            move || {
                let frame = frame.clone();
                let parsed = parsed.clone();
                async move {
                    let element_box = frame.resolve_element_box(&parsed, pierce).await?;
                    Ok(element_box.filter(|b| b.visible))
                }
            },
            WaitOptions::described(description)
                .timeout_ms(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
        )
        .await
    }

    pub(crate) fn sink(&self) -> Arc<dyn EventSink> {
        self.sink.clone()
    }

    fn action_span(&self, name: &str, selector: &str, sensitive: bool) -> OperationSpan {
        OperationSpan::action(
            self.sink.clone(),
            name,
            Some(selector.to_string()),
            Some(self.id.clone()),
            sensitive,
        )
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let meta = self.meta.lock();
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("url", &meta.url)
            .field("parent_id", &meta.parent_id)
            .field("execution_context_id", &meta.execution_context_id)
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

    use crate::events::{EventPhase, RecordingSink};
    use crate::identifiers::SessionId;
    use crate::test_support::{ScriptedCall, ScriptedServer, reply};
    use crate::transport::Connection;

    async fn scripted_frame<H>(
        handler: H,
    ) -> (Frame, Arc<RecordingSink>, Arc<Connection>, ScriptedServer)
    where
        H: FnMut(ScriptedCall) -> Vec<Value> + Send + 'static,
    {
        let server = ScriptedServer::spawn(handler).await;
        let connection = Connection::connect(&server.url()).await.expect("connect");
        let session = connection.create_session(SessionId::new("S1"));
        let sink = Arc::new(RecordingSink::new());
        let frame = Frame::new(FrameId::new("F1"), session, sink.clone());
        (frame, sink, connection, server)
    }

    fn eval_result(value: Value) -> Value {
        json!({"result": {"value": value}})
    }

    #[tokio::test]
    async fn test_text_of_missing_element_is_none() {
        let (frame, _, _conn, _server) =
            scripted_frame(|call| vec![reply(call.id, eval_result(Value::Null))]).await;

        let text = frame
            .text("#missing", SelectorOptions::default())
            .await
            .expect("read");
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn test_exists_releases_the_handle() {
        let methods = Arc::new(Mutex::new(Vec::new()));
        let (frame, _, _conn, _server) = scripted_frame({
            let methods = methods.clone();
            move |call| {
                methods.lock().push(call.method.clone());
                match call.method.as_str() {
                    "Runtime.evaluate" => vec![reply(
                        call.id,
                        json!({"result": {"objectId": "obj-1", "subtype": "node"}}),
                    )],
                    _ => vec![reply(call.id, json!({}))],
                }
            }
        })
        .await;

        let exists = frame
            .exists("#submit", SelectorOptions::default())
            .await
            .expect("exists");
        assert!(exists);
        assert_eq!(
            methods.lock().as_slice(),
            ["Runtime.evaluate", "Runtime.releaseObject"]
        );
    }

    #[tokio::test]
    async fn test_click_waits_out_hidden_element() {
        // Hidden for the first two measurements, visible afterwards; a
        // later unrelated mutation making the element visible must let
        // the click proceed rather than fail immediately.
        let (frame, sink, _conn, _server) = scripted_frame({
            let mut measurements = 0;
            move |call| match call.method.as_str() {
                "Runtime.evaluate" => {
                    measurements += 1;
                    let visible = measurements > 2;
                    vec![reply(
                        call.id,
                        eval_result(json!({
                            "x": 10.0, "y": 20.0, "width": 100.0, "height": 40.0,
                            "visible": visible
                        })),
                    )]
                }
                "Input.dispatchMouseEvent" => vec![reply(call.id, json!({}))],
                other => panic!("unexpected method {other}"),
            }
        })
        .await;

        frame
            .click(
                "#late",
                ClickOptions {
                    timeout_ms: Some(2_000),
                    ..ClickOptions::default()
                },
            )
            .await
            .expect("click succeeds once visible");

        let events = sink.events();
        assert_eq!(events[0].phase, EventPhase::ActionStart);
        assert_eq!(events.last().expect("end").phase, EventPhase::ActionEnd);
    }

    #[tokio::test]
    async fn test_dblclick_sends_second_pair_with_click_count_two() {
        let clicks = Arc::new(Mutex::new(Vec::new()));
        let (frame, _, _conn, _server) = scripted_frame({
            let clicks = clicks.clone();
            move |call| match call.method.as_str() {
                "Runtime.evaluate" => vec![reply(
                    call.id,
                    eval_result(json!({
                        "x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0, "visible": true
                    })),
                )],
                "Input.dispatchMouseEvent" => {
                    clicks.lock().push((
                        call.params["type"].as_str().unwrap_or("").to_string(),
                        call.params["clickCount"].as_u64(),
                    ));
                    vec![reply(call.id, json!({}))]
                }
                other => panic!("unexpected method {other}"),
            }
        })
        .await;

        frame
            .dblclick("#b", ClickOptions::default())
            .await
            .expect("dblclick");

        let clicks = clicks.lock();
        assert_eq!(clicks.len(), 6);
        assert_eq!(clicks[1], ("mousePressed".to_string(), Some(1)));
        assert_eq!(clicks[4], ("mousePressed".to_string(), Some(2)));
        assert_eq!(clicks[5], ("mouseReleased".to_string(), Some(2)));
    }

    #[tokio::test]
    async fn test_type_focuses_then_inserts_once() {
        let methods = Arc::new(Mutex::new(Vec::new()));
        let (frame, sink, _conn, _server) = scripted_frame({
            let methods = methods.clone();
            let mut evaluations = 0;
            move |call| {
                methods.lock().push(call.method.clone());
                match call.method.as_str() {
                    "Runtime.evaluate" => {
                        evaluations += 1;
                        // First evaluate measures the box, second focuses.
                        let value = if evaluations == 1 {
                            json!({"x": 0.0, "y": 0.0, "width": 5.0, "height": 5.0, "visible": true})
                        } else {
                            json!(true)
                        };
                        vec![reply(call.id, eval_result(value))]
                    }
                    "Input.insertText" => {
                        assert_eq!(call.params["text"], "hunter2");
                        vec![reply(call.id, json!({}))]
                    }
                    other => panic!("unexpected method {other}"),
                }
            }
        })
        .await;

        frame
            .type_secure("#password", "hunter2", TypeOptions::default())
            .await
            .expect("type");

        assert_eq!(
            methods
                .lock()
                .iter()
                .filter(|m| *m == "Input.insertText")
                .count(),
            1
        );
        assert!(sink.events().iter().all(|e| e.sensitive));
    }

    #[tokio::test]
    async fn test_fill_input_polls_until_control_appears() {
        let (frame, _, _conn, _server) = scripted_frame({
            let mut attempts = 0;
            move |call| {
                attempts += 1;
                vec![reply(call.id, eval_result(json!(attempts >= 3)))]
            }
        })
        .await;

        frame
            .fill_input("form >>> input", "value", Some(2_000))
            .await
            .expect("fill succeeds on third poll");
    }

    #[tokio::test]
    async fn test_query_all_unpacks_and_releases_array() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let (frame, _, _conn, _server) = scripted_frame({
            let released = released.clone();
            move |call| match call.method.as_str() {
                "Runtime.evaluate" => {
                    vec![reply(call.id, json!({"result": {"objectId": "arr-1"}}))]
                }
                "Runtime.getProperties" => vec![reply(
                    call.id,
                    json!({"result": [
                        {"name": "0", "value": {"objectId": "el-0"}},
                        {"name": "1", "value": {"objectId": "el-1"}},
                        {"name": "length", "value": {"value": 2}}
                    ]}),
                )],
                "Runtime.releaseObject" => {
                    released
                        .lock()
                        .push(call.params["objectId"].as_str().unwrap_or("").to_string());
                    vec![reply(call.id, json!({}))]
                }
                other => panic!("unexpected method {other}"),
            }
        })
        .await;

        let handles = frame
            .query_all(".item", SelectorOptions::default())
            .await
            .expect("query all");

        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].object_id, "el-0");
        assert_eq!(released.lock().as_slice(), ["arr-1"]);
    }
}
