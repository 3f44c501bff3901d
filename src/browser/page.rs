//! Page: frame-table state machine, navigation, screenshots.
//!
//! A page owns the frame table for one attached target and drives it
//! purely from the session's event stream. Frame attach/navigate/detach
//! and execution-context lifecycle notifications mutate the table on
//! the connection's reader path, so state reflects events in
//! transport-delivery order; any call issued after an event was applied
//! observes its effects.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::events::{EventSink, OperationSpan};
use crate::identifiers::FrameId;
use crate::policy::{NavigationPolicy, ensure_within_root};
use crate::protocol::{
    Command, DomCommand, FrameTree, FrameTreeResult, PageCommand, ParsedEvent, RuntimeCommand,
};
use crate::transport::Session;
use crate::wait::{DEFAULT_TIMEOUT_MS, WaitOptions, wait_for};

use super::frame::{ClickOptions, ElementHandle, Frame, SelectorOptions, TypeOptions};
use super::locator::Locator;

// ============================================================================
// Options
// ============================================================================

/// Lifecycle milestone a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// The `DOMContentLoaded` milestone.
    DomContentLoaded,
    /// The `load` milestone.
    #[default]
    Load,
}

impl WaitUntil {
    /// Milestone name as reported by the browser.
    #[inline]
    #[must_use]
    pub const fn milestone(self) -> &'static str {
        match self {
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::Load => "load",
        }
    }
}

/// Options for [`Page::goto`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GotoOptions {
    /// Milestone to wait for; default `load`.
    pub wait_until: WaitUntil,
    /// Overall deadline for the lifecycle wait; default 30s.
    pub timeout_ms: Option<u64>,
}

/// Raster image format for screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenshotFormat {
    #[default]
    Png,
    Jpeg,
}

impl ScreenshotFormat {
    const fn wire_name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// Options for [`Page::screenshot`].
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    /// Image format; default PNG.
    pub format: ScreenshotFormat,
    /// Compression quality, jpeg only.
    pub quality: Option<u8>,
    /// Persist the image here as well as returning it.
    pub path: Option<PathBuf>,
}

/// Criteria for looking a frame up in the table.
#[derive(Debug, Clone, Default)]
pub struct FrameQuery {
    name: Option<String>,
    url_includes: Option<String>,
}

impl FrameQuery {
    /// Matches frames whose name equals `name`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Matches frames whose URL contains `fragment`.
    #[must_use]
    pub fn url_includes(mut self, fragment: impl Into<String>) -> Self {
        self.url_includes = Some(fragment.into());
        self
    }

    fn matches(&self, frame: &Frame) -> bool {
        if let Some(name) = &self.name
            && frame.name().as_deref() != Some(name)
        {
            return false;
        }
        if let Some(fragment) = &self.url_includes
            && !frame.url().is_some_and(|url| url.contains(fragment))
        {
            return false;
        }
        true
    }
}

// ============================================================================
// Page
// ============================================================================

#[derive(Default)]
struct PageState {
    frames: FxHashMap<FrameId, Frame>,
    main_frame_id: Option<FrameId>,
    // Milestones seen per frame. Accumulates for the life of the frame
    // and is not cleared when the same frame navigates again, so a
    // second goto waiting on an already-seen milestone returns
    // immediately. Known limitation, kept as-is.
    lifecycle: FxHashMap<FrameId, FxHashSet<String>>,
}

/// One attached target: frame tree, navigation, screenshots.
pub struct Page {
    session: Session,
    sink: Arc<dyn EventSink>,
    policy: NavigationPolicy,
    state: Arc<Mutex<PageState>>,
    screenshot_root: Option<PathBuf>,
}

impl Page {
    pub(crate) fn new(
        session: Session,
        sink: Arc<dyn EventSink>,
        policy: NavigationPolicy,
    ) -> Self {
        Self {
            session,
            sink,
            policy,
            state: Arc::new(Mutex::new(PageState::default())),
            screenshot_root: None,
        }
    }

    /// Confines screenshot persistence targets to `root`.
    pub fn restrict_screenshots_to(&mut self, root: impl Into<PathBuf>) {
        self.screenshot_root = Some(root.into());
    }

    /// Enables the needed protocol domains, subscribes to the event
    /// stream, and seeds the frame table from the current frame tree.
    ///
    /// Must run once before any other operation.
    pub(crate) async fn initialize(&self) -> Result<()> {
        self.session.send(Command::Page(PageCommand::Enable)).await?;
        self.session.send(Command::Dom(DomCommand::Enable)).await?;
        self.session
            .send(Command::Runtime(RuntimeCommand::Enable))
            .await?;
        self.session
            .send(Command::Page(PageCommand::SetLifecycleEventsEnabled {
                enabled: true,
            }))
            .await?;

        let state = self.state.clone();
        let session = self.session.clone();
        let sink = self.sink.clone();
        self.session.on(Box::new(move |method, params| {
            let event = ParsedEvent::parse(method, params);
            apply_event(&state, &session, &sink, event);
        }));

        let tree = self
            .session
            .send(Command::Page(PageCommand::GetFrameTree))
            .await?;
        let tree: FrameTreeResult = serde_json::from_value(tree)?;
        {
            let mut state = self.state.lock();
            seed_frame_tree(&mut state, &self.session, &self.sink, &tree.frame_tree);
        }
        debug!(frames = self.state.lock().frames.len(), "page initialized");
        Ok(())
    }

    // ========================================================================
    // Frame Lookup
    // ========================================================================

    /// The frame with no parent.
    ///
    /// # Errors
    ///
    /// [`Error::State`] if the page has not been initialized or the
    /// main frame is missing from the table.
    pub fn main_frame(&self) -> Result<Frame> {
        let state = self.state.lock();
        let main_frame_id = state
            .main_frame_id
            .as_ref()
            .ok_or_else(|| Error::state("main frame not initialized"))?;
        state
            .frames
            .get(main_frame_id)
            .cloned()
            .ok_or_else(|| Error::state("main frame missing from frame table"))
    }

    /// Every frame currently in the table.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.state.lock().frames.values().cloned().collect()
    }

    /// First frame matching `query`, if any.
    #[must_use]
    pub fn frame(&self, query: &FrameQuery) -> Option<Frame> {
        self.state
            .lock()
            .frames
            .values()
            .find(|frame| query.matches(frame))
            .cloned()
    }

    /// First frame satisfying `predicate`, if any.
    #[must_use]
    pub fn frame_matching(&self, predicate: impl Fn(&Frame) -> bool) -> Option<Frame> {
        self.state
            .lock()
            .frames
            .values()
            .find(|frame| predicate(frame))
            .cloned()
    }

    /// Selector-bound handle on the main frame.
    ///
    /// # Errors
    ///
    /// [`Error::State`] if the page has no main frame yet.
    pub fn locator(&self, selector: &str, options: SelectorOptions) -> Result<Locator> {
        Ok(Locator::new(self.main_frame()?, selector, options))
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigates the main frame and waits for the requested milestone.
    ///
    /// The URL is validated against the navigation policy first. After
    /// `Page.navigate` is issued, the call polls (100ms interval) until
    /// the main frame's lifecycle set contains the milestone name.
    ///
    /// # Errors
    ///
    /// - [`Error::DisallowedUrl`] / [`Error::InvalidUrl`] from the policy.
    /// - [`Error::WaitTimeout`] if the milestone never arrives.
    pub async fn goto(&self, url: &str, options: GotoOptions) -> Result<()> {
        self.policy.ensure_allowed(url)?;

        let main_frame_id = self.state.lock().main_frame_id.clone();
        let _span = OperationSpan::action(
            self.sink.clone(),
            "goto",
            Some(url.to_string()),
            main_frame_id,
            false,
        );

        self.session
            .send(Command::Page(PageCommand::Navigate {
                url: url.to_string(),
            }))
            .await?;

        let main_frame_id = self
            .state
            .lock()
            .main_frame_id
            .clone()
            .ok_or_else(|| Error::state("main frame not initialized"))?;
        let milestone = options.wait_until.milestone();

        let state = self.state.clone();
        wait_for(
            move || {
                let state = state.clone();
                let main_frame_id = main_frame_id.clone();
                async move {
                    let seen = state
                        .lock()
                        .lifecycle
                        .get(&main_frame_id)
                        .is_some_and(|set| set.contains(milestone));
                    Ok(seen.then_some(()))
                }
            },
            WaitOptions::described(format!("lifecycle {milestone} for {url}"))
                .timeout_ms(options.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
        )
        .await
    }

    // ========================================================================
    // Screenshots
    // ========================================================================

    /// Captures a raster image of the page, optionally persisting it.
    ///
    /// When a screenshot root was configured, the target path must
    /// resolve inside it.
    pub async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>> {
        let _span = self.page_span("screenshot");
        let data = self.capture(options.format, options.quality).await?;
        let bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|e| Error::protocol(format!("bad screenshot payload: {e}")))?;

        if let Some(path) = &options.path {
            let target = self.screenshot_target(path)?;
            tokio::fs::write(&target, &bytes).await?;
            debug!(path = %target.display(), "screenshot written");
        }
        Ok(bytes)
    }

    /// Captures a raster image and returns its base64 payload.
    pub async fn screenshot_base64(
        &self,
        format: ScreenshotFormat,
        quality: Option<u8>,
    ) -> Result<String> {
        let _span = self.page_span("screenshotBase64");
        self.capture(format, quality).await
    }

    async fn capture(&self, format: ScreenshotFormat, quality: Option<u8>) -> Result<String> {
        let result = self
            .session
            .send(Command::Page(PageCommand::CaptureScreenshot {
                format: format.wire_name(),
                quality,
                from_surface: true,
            }))
            .await?;
        result["data"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::protocol("screenshot response missing data"))
    }

    // ========================================================================
    // Main-frame Forwarders
    // ========================================================================

    /// [`Frame::query`] on the main frame.
    pub async fn query(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.main_frame()?.query(selector, options).await
    }

    /// [`Frame::query_all`] on the main frame.
    pub async fn query_all(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Vec<ElementHandle>> {
        self.main_frame()?.query_all(selector, options).await
    }

    /// [`Frame::query_path`] on the main frame.
    pub async fn query_path(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.main_frame()?.query_path(selector, options).await
    }

    /// [`Frame::query_all_path`] on the main frame.
    pub async fn query_all_path(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Vec<ElementHandle>> {
        self.main_frame()?.query_all_path(selector, options).await
    }

    /// [`Frame::click`] on the main frame.
    pub async fn click(&self, selector: &str, options: ClickOptions) -> Result<()> {
        self.main_frame()?.click(selector, options).await
    }

    /// [`Frame::dblclick`] on the main frame.
    pub async fn dblclick(&self, selector: &str, options: ClickOptions) -> Result<()> {
        self.main_frame()?.dblclick(selector, options).await
    }

    /// [`Frame::type_text`] on the main frame.
    pub async fn type_text(&self, selector: &str, text: &str, options: TypeOptions) -> Result<()> {
        self.main_frame()?.type_text(selector, text, options).await
    }

    /// [`Frame::type_secure`] on the main frame.
    pub async fn type_secure(
        &self,
        selector: &str,
        text: &str,
        options: TypeOptions,
    ) -> Result<()> {
        self.main_frame()?.type_secure(selector, text, options).await
    }

    /// [`Frame::fill_input`] on the main frame.
    pub async fn fill_input(
        &self,
        selector: &str,
        value: &str,
        timeout_ms: Option<u64>,
    ) -> Result<()> {
        self.main_frame()?.fill_input(selector, value, timeout_ms).await
    }

    /// [`Frame::select_option`] on the main frame.
    pub async fn select_option(
        &self,
        selector: &str,
        value: &str,
        options: SelectorOptions,
    ) -> Result<bool> {
        self.main_frame()?.select_option(selector, value, options).await
    }

    /// [`Frame::set_file_input`] on the main frame.
    pub async fn set_file_input(
        &self,
        selector: &str,
        file_name: &str,
        contents: &str,
        mime_type: Option<&str>,
        options: SelectorOptions,
    ) -> Result<bool> {
        self.main_frame()?
            .set_file_input(selector, file_name, contents, mime_type, options)
            .await
    }

    /// [`Frame::text_secure`] on the main frame.
    pub async fn text_secure(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<String>> {
        self.main_frame()?.text_secure(selector, options).await
    }

    /// [`Frame::value_secure`] on the main frame.
    pub async fn value_secure(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Option<String>> {
        self.main_frame()?.value_secure(selector, options).await
    }

    /// [`Frame::evaluate`] on the main frame.
    pub async fn evaluate(&self, expression: impl Into<String>) -> Result<Value> {
        self.main_frame()?.evaluate(expression).await
    }

    pub(crate) fn sink(&self) -> Arc<dyn EventSink> {
        self.sink.clone()
    }

    fn page_span(&self, name: &str) -> OperationSpan {
        let frame_id = self.state.lock().main_frame_id.clone();
        OperationSpan::action(self.sink.clone(), name, None, frame_id, false)
    }

    fn screenshot_target(&self, path: &Path) -> Result<PathBuf> {
        match &self.screenshot_root {
            Some(root) => ensure_within_root(root, path),
            None => Ok(path.to_path_buf()),
        }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Page")
            .field("session", self.session.id())
            .field("frames", &state.frames.len())
            .field("main_frame_id", &state.main_frame_id)
            .finish()
    }
}

// ============================================================================
// State Machine
// ============================================================================

fn ensure_frame(
    state: &mut PageState,
    session: &Session,
    sink: &Arc<dyn EventSink>,
    frame_id: &FrameId,
) -> Frame {
    state
        .frames
        .entry(frame_id.clone())
        .or_insert_with(|| Frame::new(frame_id.clone(), session.clone(), sink.clone()))
        .clone()
}

fn seed_frame_tree(
    state: &mut PageState,
    session: &Session,
    sink: &Arc<dyn EventSink>,
    tree: &FrameTree,
) {
    let frame = ensure_frame(state, session, sink, &tree.frame.id);
    frame.set_navigation_meta(
        tree.frame.name.clone(),
        tree.frame.url.clone(),
        tree.frame.parent_id.clone(),
    );
    if tree.frame.parent_id.is_none() {
        state.main_frame_id = Some(tree.frame.id.clone());
    }
    for child in &tree.child_frames {
        seed_frame_tree(state, session, sink, child);
    }
}

fn apply_event(
    state: &Arc<Mutex<PageState>>,
    session: &Session,
    sink: &Arc<dyn EventSink>,
    event: ParsedEvent,
) {
    let mut state = state.lock();
    match event {
        ParsedEvent::FrameAttached {
            frame_id,
            parent_frame_id,
        } => {
            let frame = ensure_frame(&mut state, session, sink, &frame_id);
            frame.set_parent(parent_frame_id);
        }

        ParsedEvent::FrameNavigated { frame: info } => {
            let frame = ensure_frame(&mut state, session, sink, &info.id);
            frame.set_navigation_meta(info.name, info.url, info.parent_id.clone());
            if info.parent_id.is_none() {
                state.main_frame_id = Some(info.id);
            }
        }

        ParsedEvent::FrameDetached { frame_id } => {
            state.frames.remove(&frame_id);
        }

        ParsedEvent::ExecutionContextCreated {
            context_id,
            frame_id,
        } => {
            if let Some(frame_id) = frame_id {
                let frame = ensure_frame(&mut state, session, sink, &frame_id);
                frame.set_execution_context(Some(context_id));
            }
        }

        ParsedEvent::ExecutionContextDestroyed { context_id } => {
            for frame in state.frames.values() {
                if frame.execution_context() == Some(context_id) {
                    frame.set_execution_context(None);
                }
            }
        }

        ParsedEvent::ExecutionContextsCleared => {
            for frame in state.frames.values() {
                frame.set_execution_context(None);
            }
        }

        ParsedEvent::LifecycleEvent { frame_id, name } => {
            state.lifecycle.entry(frame_id).or_default().insert(name);
        }

        ParsedEvent::Unknown { method } => trace!(method, "ignoring notification"),
    }
}

// ============================================================================
// Tests
// ============================================================================
