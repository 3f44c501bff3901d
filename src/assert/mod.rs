//! Retrying assertion engine.
//!
//! `expect(&page)` produces matchers that poll a frame read until it
//! satisfies the expectation or the timeout expires. [`ElementExpectation::not`]
//! returns an equivalent matcher with the negation flag inverted.
//!
//! Null contract: a missing element (a `None` observation) fails every
//! positive expectation and satisfies every negated one, consistent
//! with the frame reads. On timeout the matcher raises an
//! [`AssertionError`] carrying the selector, the configured timeout,
//! and the last evaluated outcome (negation applied). Paired assertion start/end events
//! surround every matcher's poll loop regardless of pass/fail.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Value, json};

use crate::browser::frame::{Frame, SelectorOptions};
use crate::browser::page::{FrameQuery, Page};
use crate::error::{AssertionError, Error, Result};
use crate::events::OperationSpan;
use crate::wait::{DEFAULT_TIMEOUT_MS, WaitOptions, wait_for};

// ============================================================================
// Expected
// ============================================================================

/// Expected value of a text/value/attribute/class/css matcher.
#[derive(Debug, Clone)]
pub enum Expected {
    /// A literal string; substring or exact match depending on matcher.
    Literal(String),
    /// A compiled pattern; always tested with `is_match`.
    Pattern(Regex),
}

impl Expected {
    /// Compiles a `/pattern/flags` literal.
    ///
    /// The `g` (global) flag is stripped: matching here is stateless,
    /// so two consecutive identical assertions against unchanged
    /// content behave identically. `i`, `m`, and `s` map to the
    /// corresponding inline flags.
    ///
    /// # Errors
    ///
    /// Returns the compile error for an invalid pattern.
    pub fn pattern_literal(literal: &str) -> std::result::Result<Self, regex::Error> {
        let (source, flags) = match literal.strip_prefix('/').and_then(|rest| {
            let end = rest.rfind('/')?;
            Some((&rest[..end], &rest[end + 1..]))
        }) {
            Some(parts) => parts,
            None => (literal, ""),
        };

        let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
        let pattern = if inline.is_empty() {
            source.to_string()
        } else {
            format!("(?{inline}){source}")
        };
        Ok(Self::Pattern(Regex::new(&pattern)?))
    }

    fn matches_substring(&self, actual: &str) -> bool {
        match self {
            Self::Literal(expected) => actual.contains(expected.as_str()),
            Self::Pattern(expected) => expected.is_match(actual),
        }
    }

    fn matches_exact(&self, actual: &str) -> bool {
        match self {
            Self::Literal(expected) => actual == expected,
            Self::Pattern(expected) => expected.is_match(actual),
        }
    }
}

impl From<&str> for Expected {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for Expected {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<Regex> for Expected {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Options shared by every matcher built from one expectation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectOptions {
    /// Overall matcher deadline; default 30s.
    pub timeout_ms: Option<u64>,
    /// Resolve the selector through nested shadow roots.
    pub pierce_shadow_dom: bool,
}

/// Builds expectations against a page.
#[must_use]
pub fn expect(page: &Page) -> Expect<'_> {
    Expect { page }
}

/// Builds expectations scoped to one frame directly.
#[must_use]
pub fn expect_frame(frame: &Frame) -> FrameExpect {
    FrameExpect {
        frame: frame.clone(),
    }
}

/// Expectation builder bound to one page.
pub struct Expect<'a> {
    page: &'a Page,
}

impl Expect<'_> {
    /// Expectation on the main frame's first match of `selector`.
    ///
    /// # Errors
    ///
    /// [`Error::State`] if the page has no main frame yet.
    pub fn element(&self, selector: &str, options: ExpectOptions) -> Result<ElementExpectation> {
        Ok(ElementExpectation::new(
            self.page.main_frame()?,
            selector,
            options,
        ))
    }

    /// Expectations scoped to the frame matching `query`.
    ///
    /// # Errors
    ///
    /// [`Error::Assertion`] if no frame matches.
    pub fn frame(&self, query: &FrameQuery) -> Result<FrameExpect> {
        let frame = self.page.frame(query).ok_or_else(|| {
            Error::from(AssertionError::new(
                "Frame not found",
                Some(format!("{query:?}")),
                None,
                None,
            ))
        })?;
        Ok(FrameExpect { frame })
    }
}

/// Expectation builder bound to one frame.
pub struct FrameExpect {
    frame: Frame,
}

impl FrameExpect {
    /// Expectation on this frame's first match of `selector`.
    #[must_use]
    pub fn element(&self, selector: &str, options: ExpectOptions) -> ElementExpectation {
        ElementExpectation::new(self.frame.clone(), selector, options)
    }
}

// ============================================================================
// ElementExpectation
// ============================================================================

/// A retrying matcher bound to a frame, a selector, and a negation flag.
#[derive(Clone)]
pub struct ElementExpectation {
    frame: Frame,
    selector: String,
    options: ExpectOptions,
    negate: bool,
}

impl ElementExpectation {
    fn new(frame: Frame, selector: &str, options: ExpectOptions) -> Self {
        Self {
            frame,
            selector: selector.to_string(),
            options,
            negate: false,
        }
    }

    /// An equivalent expectation with the negation flag inverted.
    #[must_use]
    pub fn not(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    fn selector_options(&self) -> SelectorOptions {
        SelectorOptions {
            pierce_shadow_dom: self.options.pierce_shadow_dom,
        }
    }

    // ========================================================================
    // Presence / Visibility
    // ========================================================================

    /// Passes once any element matches the selector.
    pub async fn to_exist(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run("Expected element to exist", "Expected element not to exist", move || {
            let frame = frame.clone();
            let selector = selector.clone();
            async move { Ok(Some(frame.exists(&selector, opts).await?)) }
        })
        .await
    }

    /// Passes once the element measures a visible, non-zero box.
    pub async fn to_be_visible(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be visible",
            "Expected element not to be visible",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { Ok(Some(frame.is_visible(&selector, opts).await?)) }
            },
        )
        .await
    }

    /// Passes while the element is missing or not visible.
    pub async fn to_be_hidden(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be hidden",
            "Expected element not to be hidden",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { Ok(Some(!frame.is_visible(&selector, opts).await?)) }
            },
        )
        .await
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Passes once the element exists and is enabled.
    pub async fn to_be_enabled(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be enabled",
            "Expected element not to be enabled",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { frame.is_enabled(&selector, opts).await }
            },
        )
        .await
    }

    /// Passes once the element exists and is disabled.
    pub async fn to_be_disabled(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be disabled",
            "Expected element not to be disabled",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { Ok(frame.is_enabled(&selector, opts).await?.map(|enabled| !enabled)) }
            },
        )
        .await
    }

    /// Passes once the element reports a checked state of true.
    pub async fn to_be_checked(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be checked",
            "Expected element not to be checked",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { frame.is_checked(&selector, opts).await }
            },
        )
        .await
    }

    /// Passes once the element reports a checked state of false.
    pub async fn to_be_unchecked(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be unchecked",
            "Expected element not to be unchecked",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { Ok(frame.is_checked(&selector, opts).await?.map(|checked| !checked)) }
            },
        )
        .await
    }

    /// Passes once the element accepts edits.
    pub async fn to_be_editable(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be editable",
            "Expected element not to be editable",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { frame.is_editable(&selector, opts).await }
            },
        )
        .await
    }

    /// Passes once the element is the document's active element.
    pub async fn to_have_focus(&self) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to have focus",
            "Expected element not to have focus",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { frame.has_focus(&selector, opts).await }
            },
        )
        .await
    }

    /// Passes once the element's box intersects the viewport; with
    /// `fully` it must fit entirely inside it.
    pub async fn to_be_in_viewport(&self, fully: bool) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element to be in viewport",
            "Expected element not to be in viewport",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { frame.is_in_viewport(&selector, opts, fully).await }
            },
        )
        .await
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Passes once the element's text contains/matches `expected`.
    pub async fn to_have_text(&self, expected: impl Into<Expected>) -> Result<()> {
        self.text_matcher(
            expected.into(),
            false,
            "Expected element text to match",
            "Expected element text not to match",
        )
        .await
    }

    /// Passes once the element's text equals/matches `expected`.
    pub async fn to_have_exact_text(&self, expected: impl Into<Expected>) -> Result<()> {
        self.text_matcher(
            expected.into(),
            true,
            "Expected element text to match exactly",
            "Expected element text not to match exactly",
        )
        .await
    }

    /// Passes once the element's text contains/matches `expected`.
    pub async fn to_contain_text(&self, expected: impl Into<Expected>) -> Result<()> {
        self.text_matcher(
            expected.into(),
            false,
            "Expected element text to contain",
            "Expected element text not to contain",
        )
        .await
    }

    async fn text_matcher(
        &self,
        expected: Expected,
        exact: bool,
        positive: &str,
        negative: &str,
    ) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(positive, negative, move || {
            let frame = frame.clone();
            let selector = selector.clone();
            let expected = expected.clone();
            async move {
                Ok(frame.text(&selector, opts).await?.map(|text| {
                    if exact {
                        expected.matches_exact(&text)
                    } else {
                        expected.matches_substring(&text)
                    }
                }))
            }
        })
        .await
    }

    /// Passes once the element's form value equals/matches `expected`.
    pub async fn to_have_value(&self, expected: impl Into<Expected>) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        let expected = expected.into();
        self.run(
            "Expected element value to match",
            "Expected element value not to match",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                let expected = expected.clone();
                async move {
                    Ok(frame
                        .value(&selector, opts)
                        .await?
                        .map(|value| expected.matches_exact(&value)))
                }
            },
        )
        .await
    }

    /// With `expected`, passes once the attribute equals/matches it;
    /// without, passes once the attribute is present at all.
    pub async fn to_have_attribute(
        &self,
        name: &str,
        expected: Option<Expected>,
    ) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        let name = name.to_string();
        self.run(
            "Expected element attribute to match",
            "Expected element attribute not to match",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                let name = name.clone();
                let expected = expected.clone();
                async move {
                    let value = frame.attribute(&selector, &name, opts).await?;
                    Ok(match &expected {
                        None => Some(value.is_some()),
                        Some(expected) => value.map(|value| expected.matches_exact(&value)),
                    })
                }
            },
        )
        .await
    }

    /// Shorthand for [`Self::to_have_attribute`] on `id`.
    pub async fn to_have_id(&self, expected: impl Into<Expected>) -> Result<()> {
        self.to_have_attribute("id", Some(expected.into())).await
    }

    /// Shorthand for [`Self::to_have_attribute`] on `name`.
    pub async fn to_have_name(&self, expected: impl Into<Expected>) -> Result<()> {
        self.to_have_attribute("name", Some(expected.into())).await
    }

    /// Passes once one of the element's classes equals/matches `expected`.
    pub async fn to_have_class(&self, expected: impl Into<Expected>) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        let expected = expected.into();
        self.run(
            "Expected element class to match",
            "Expected element class not to match",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                let expected = expected.clone();
                async move {
                    Ok(frame.classes(&selector, opts).await?.map(|classes| {
                        classes.iter().any(|class| expected.matches_exact(class))
                    }))
                }
            },
        )
        .await
    }

    /// Passes once every name in `expected` is among the element's classes.
    pub async fn to_have_classes(&self, expected: &[&str]) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        let expected: Vec<String> = expected.iter().map(|s| (*s).to_string()).collect();
        self.run(
            "Expected element classes to match",
            "Expected element classes not to match",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                let expected = expected.clone();
                async move {
                    Ok(frame.classes(&selector, opts).await?.map(|classes| {
                        expected.iter().all(|name| classes.contains(name))
                    }))
                }
            },
        )
        .await
    }

    /// Passes once the computed style `property` equals/matches `expected`.
    pub async fn to_have_css(&self, property: &str, expected: impl Into<Expected>) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        let property = property.to_string();
        let expected = expected.into();
        self.run(
            "Expected element css to match",
            "Expected element css not to match",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                let property = property.clone();
                let expected = expected.clone();
                async move {
                    Ok(frame
                        .css(&selector, &property, opts)
                        .await?
                        .map(|value| expected.matches_exact(value.trim())))
                }
            },
        )
        .await
    }

    /// Passes once exactly `expected` elements match the selector.
    pub async fn to_have_count(&self, expected: u64) -> Result<()> {
        let (frame, selector, opts) = self.parts();
        self.run(
            "Expected element count to match",
            "Expected element count not to match",
            move || {
                let frame = frame.clone();
                let selector = selector.clone();
                async move { Ok(Some(frame.count(&selector, opts).await? == expected)) }
            },
        )
        .await
    }

    // ========================================================================
    // Core
    // ========================================================================

    fn parts(&self) -> (Frame, String, SelectorOptions) {
        (
            self.frame.clone(),
            self.selector.clone(),
            self.selector_options(),
        )
    }

    /// Polls `observe` until the expectation holds or the deadline passes.
    ///
    /// A `None` observation (missing element) fails the positive form
    /// and satisfies the negated form; a `Some(raw)` observation is
    /// inverted when negated. The recorded last state is the evaluated
    /// outcome with negation already applied, so a failure always
    /// reports `false`-like state rather than the raw read.
    async fn run<F, Fut>(&self, positive: &str, negative: &str, mut observe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<bool>>>,
    {
        let message = if self.negate { negative } else { positive };
        let timeout_ms = self.options.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        let negate = self.negate;

        let _span = OperationSpan::assertion(
            self.frame.sink(),
            message,
            Some(self.selector.clone()),
            Some(self.frame.id().clone()),
        );

        let last_state: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let observed = last_state.clone();
        let outcome = wait_for(
            move || {
                let future = observe();
                let observed = observed.clone();
                async move {
                    let observation = future.await?;
                    let satisfied = match observation {
                        None => negate,
                        Some(raw) => {
                            if negate {
                                !raw
                            } else {
                                raw
                            }
                        }
                    };
                    *observed.lock() = Some(json!(satisfied));
                    Ok(satisfied.then_some(()))
                }
            },
            WaitOptions::described(message).timeout_ms(timeout_ms),
        )
        .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(_) => Err(AssertionError::new(
                message,
                Some(self.selector.clone()),
                Some(timeout_ms),
                last_state.lock().take(),
            )
            .into()),
        }
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
    use crate::identifiers::{FrameId, SessionId};
    use crate::test_support::{ScriptedCall, ScriptedServer, reply};
    use crate::transport::Connection;

    async fn scripted_expectation<H>(
        handler: H,
        selector: &str,
        options: ExpectOptions,
    ) -> (ElementExpectation, Arc<RecordingSink>, ScriptedServer)
    where
        H: FnMut(ScriptedCall) -> Vec<Value> + Send + 'static,
    {
        let server = ScriptedServer::spawn(handler).await;
        let connection = Connection::connect(&server.url()).await.expect("connect");
        let session = connection.create_session(SessionId::new("S1"));
        let sink = Arc::new(RecordingSink::new());
        let frame = Frame::new(FrameId::new("F1"), session, sink.clone());
        (
            ElementExpectation::new(frame, selector, options),
            sink,
            server,
        )
    }

    fn short_timeout() -> ExpectOptions {
        ExpectOptions {
            timeout_ms: Some(300),
            ..ExpectOptions::default()
        }
    }

    fn null_element(call: ScriptedCall) -> Vec<Value> {
        match call.method.as_str() {
            "Runtime.evaluate" => {
                vec![reply(call.id, json!({"result": {"subtype": "null"}}))]
            }
            _ => vec![reply(call.id, json!({}))],
        }
    }

    #[tokio::test]
    async fn test_not_to_exist_passes_when_nothing_matches() {
        let (expectation, _, _server) =
            scripted_expectation(null_element, "#missing", short_timeout()).await;

        expectation.not().to_exist().await.expect("negated exists");
    }

    #[tokio::test]
    async fn test_to_exist_times_out_with_context() {
        let (expectation, _, _server) =
            scripted_expectation(null_element, "#missing", short_timeout()).await;

        let err = expectation.to_exist().await.expect_err("must fail");
        let Error::Assertion(assertion) = err else {
            panic!("expected assertion error, got {err}");
        };
        assert_eq!(assertion.message, "Expected element to exist");
        assert_eq!(assertion.selector.as_deref(), Some("#missing"));
        assert_eq!(assertion.timeout_ms, Some(300));
        assert_eq!(assertion.last_state, Some(json!(false)));
    }

    #[tokio::test]
    async fn test_last_state_is_outcome_with_negation_applied() {
        // The element exists (raw observation true), so the negated
        // form times out; the recorded state is the combined outcome,
        // not the raw read.
        let (expectation, _, _server) = scripted_expectation(
            |call| match call.method.as_str() {
                "Runtime.evaluate" => vec![reply(
                    call.id,
                    json!({"result": {"objectId": "obj-1", "subtype": "node"}}),
                )],
                _ => vec![reply(call.id, json!({}))],
            },
            "#present",
            short_timeout(),
        )
        .await;

        let err = expectation.not().to_exist().await.expect_err("must fail");
        let Error::Assertion(assertion) = err else {
            panic!("expected assertion error, got {err}");
        };
        assert_eq!(assertion.last_state, Some(json!(false)));
    }

    #[tokio::test]
    async fn test_null_observation_satisfies_negated_form() {
        // is_enabled yields null for a missing element; the positive
        // form fails and the negated form passes.
        let (expectation, _, _server) = scripted_expectation(
            |call| vec![reply(call.id, json!({"result": {"value": null}}))],
            "#missing",
            short_timeout(),
        )
        .await;

        expectation.not().to_be_enabled().await.expect("negated");
    }

    #[tokio::test]
    async fn test_matcher_retries_until_state_flips() {
        let (expectation, _, _server) = scripted_expectation(
            {
                let mut polls = 0;
                move |call| {
                    polls += 1;
                    let value = if polls >= 3 { json!(true) } else { json!(null) };
                    vec![reply(call.id, json!({"result": {"value": value}}))]
                }
            },
            "#toggle",
            ExpectOptions {
                timeout_ms: Some(2_000),
                ..ExpectOptions::default()
            },
        )
        .await;

        expectation.to_be_checked().await.expect("third poll passes");
    }

    #[tokio::test]
    async fn test_global_flag_pattern_is_stateless() {
        let expected = Expected::pattern_literal("/fo+/g").expect("compile");
        let (expectation, _, _server) = scripted_expectation(
            |call| vec![reply(call.id, json!({"result": {"value": "foo bar"}}))],
            "#msg",
            short_timeout(),
        )
        .await;

        // Two consecutive identical assertions against unchanged content.
        expectation
            .to_have_text(expected.clone())
            .await
            .expect("first");
        expectation.to_have_text(expected).await.expect("second");
    }

    #[tokio::test]
    async fn test_pattern_literal_flags() {
        let expected = Expected::pattern_literal("/ready/i").expect("compile");
        assert!(expected.matches_substring("READY"));

        let bare = Expected::pattern_literal("plain+").expect("compile");
        assert!(bare.matches_substring("plainnn"));
    }

    #[tokio::test]
    async fn test_exact_vs_substring_text() {
        let handler = |call: ScriptedCall| {
            vec![reply(call.id, json!({"result": {"value": "hello world"}}))]
        };

        let (expectation, _, _server) =
            scripted_expectation(handler, "#msg", short_timeout()).await;
        expectation.to_have_text("world").await.expect("substring");

        let err = expectation
            .to_have_exact_text("world")
            .await
            .expect_err("exact mismatch");
        assert!(err.is_assertion_error());
    }

    #[tokio::test]
    async fn test_attribute_presence_without_expected_value() {
        let (expectation, _, _server) = scripted_expectation(
            |call| vec![reply(call.id, json!({"result": {"value": "main"}}))],
            "#app",
            short_timeout(),
        )
        .await;

        expectation.to_have_attribute("role", None).await.expect("present");
    }

    #[tokio::test]
    async fn test_count_compares_exact_integer() {
        let (expectation, _, _server) = scripted_expectation(
            |call| vec![reply(call.id, json!({"result": {"value": 3}}))],
            ".item",
            short_timeout(),
        )
        .await;

        expectation.to_have_count(3).await.expect("exact count");
        let err = expectation.to_have_count(2).await.expect_err("mismatch");
        assert!(err.is_assertion_error());
    }

    #[tokio::test]
    async fn test_assertion_events_emitted_on_pass_and_fail() {
        let (expectation, sink, _server) =
            scripted_expectation(null_element, "#missing", short_timeout()).await;

        expectation.clone().not().to_exist().await.expect("pass");
        let _ = expectation.to_exist().await;

        let phases: Vec<_> = sink.events().iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            [
                EventPhase::AssertionStart,
                EventPhase::AssertionEnd,
                EventPhase::AssertionStart,
                EventPhase::AssertionEnd,
            ]
        );
    }
}
