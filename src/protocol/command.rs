//! Typed command definitions organized by protocol domain.
//!
//! Each domain enum serializes with `method`/`params` tags so a variant
//! becomes the exact wire form, e.g.
//! `Command::Page(PageCommand::Navigate { .. })` ->
//! `{"method":"Page.navigate","params":{"url":...}}`.
//!
//! # Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | create/attach targets, browser contexts |
//! | `Page` | enable, navigate, frame tree, screenshots, lifecycle |
//! | `Runtime` | enable, evaluate, object properties/release |
//! | `Input` | synthetic mouse events, text insertion |
//! | `Dom` | enable |
//! | `Browser` | close |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::{BrowsingContextId, ExecutionContextId, TargetId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Input domain commands.
    Input(InputCommand),
    /// DOM domain commands.
    Dom(DomCommand),
    /// Browser domain commands.
    Browser(BrowserCommand),
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain: creating and attaching to debuggable targets.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Create a new target (tab).
    #[serde(rename = "Target.createTarget")]
    CreateTarget {
        /// Initial URL for the target.
        url: String,
        /// Browsing context to create the target in.
        #[serde(rename = "browserContextId", skip_serializing_if = "Option::is_none")]
        browser_context_id: Option<BrowsingContextId>,
    },

    /// Attach to a target, yielding a session.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Use flat session routing (sessionId on every message).
        flatten: bool,
    },

    /// Create an isolated storage/cookie namespace.
    #[serde(rename = "Target.createBrowserContext")]
    CreateBrowserContext,

    /// Dispose a browsing context and every target in it.
    #[serde(rename = "Target.disposeBrowserContext")]
    DisposeBrowserContext {
        /// Context to dispose.
        #[serde(rename = "browserContextId")]
        browser_context_id: BrowsingContextId,
    },
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain: navigation, frame tree, screenshots, lifecycle events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Navigate the page's main frame.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// Destination URL.
        url: String,
    },

    /// Fetch the current frame tree.
    #[serde(rename = "Page.getFrameTree")]
    GetFrameTree,

    /// Enable per-frame lifecycle event notifications.
    #[serde(rename = "Page.setLifecycleEventsEnabled")]
    SetLifecycleEventsEnabled {
        /// Whether lifecycle events are reported.
        enabled: bool,
    },

    /// Capture a raster image of the page.
    #[serde(rename = "Page.captureScreenshot")]
    CaptureScreenshot {
        /// Image format, `png` or `jpeg`.
        format: &'static str,
        /// Compression quality for jpeg (0-100).
        #[serde(skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
        /// Capture from the surface rather than the view.
        #[serde(rename = "fromSurface")]
        from_surface: bool,
    },
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain: JavaScript evaluation and remote object management.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Enable runtime events (execution context lifecycle).
    #[serde(rename = "Runtime.enable")]
    Enable,

    /// Evaluate an expression.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// JavaScript expression source.
        expression: String,
        /// Return the value by JSON rather than by handle.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
        /// Await a returned promise before replying.
        #[serde(rename = "awaitPromise", skip_serializing_if = "std::ops::Not::not")]
        await_promise: bool,
        /// Execution context to evaluate in; page default when absent.
        #[serde(rename = "contextId", skip_serializing_if = "Option::is_none")]
        context_id: Option<ExecutionContextId>,
    },

    /// List own properties of a remote object (used to unpack arrays).
    #[serde(rename = "Runtime.getProperties")]
    GetProperties {
        /// Remote object handle.
        #[serde(rename = "objectId")]
        object_id: String,
        /// Restrict to own properties.
        #[serde(rename = "ownProperties")]
        own_properties: bool,
    },

    /// Release a remote object handle.
    #[serde(rename = "Runtime.releaseObject")]
    ReleaseObject {
        /// Handle to release.
        #[serde(rename = "objectId")]
        object_id: String,
    },
}

// ============================================================================
// Input Commands
// ============================================================================

/// Input domain: synthetic pointer and text events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum InputCommand {
    /// Dispatch a synthetic mouse event.
    #[serde(rename = "Input.dispatchMouseEvent")]
    DispatchMouseEvent {
        /// `mouseMoved`, `mousePressed`, or `mouseReleased`.
        #[serde(rename = "type")]
        kind: &'static str,
        /// Viewport x coordinate.
        x: f64,
        /// Viewport y coordinate.
        y: f64,
        /// Button generating the event.
        #[serde(skip_serializing_if = "Option::is_none")]
        button: Option<&'static str>,
        /// Click ordinal within a multi-click gesture.
        #[serde(rename = "clickCount", skip_serializing_if = "Option::is_none")]
        click_count: Option<u32>,
        /// Bitmask of buttons currently held.
        #[serde(skip_serializing_if = "Option::is_none")]
        buttons: Option<u32>,
    },

    /// Insert text into the focused element as one event.
    #[serde(rename = "Input.insertText")]
    InsertText {
        /// Text to insert.
        text: String,
    },
}

impl InputCommand {
    /// Synthetic pointer move to the given point.
    #[inline]
    #[must_use]
    pub fn mouse_moved(x: f64, y: f64) -> Self {
        Self::DispatchMouseEvent {
            kind: "mouseMoved",
            x,
            y,
            button: None,
            click_count: None,
            buttons: None,
        }
    }

    /// Left-button press at the given point.
    #[inline]
    #[must_use]
    pub fn mouse_pressed(x: f64, y: f64, click_count: u32) -> Self {
        Self::DispatchMouseEvent {
            kind: "mousePressed",
            x,
            y,
            button: Some("left"),
            click_count: Some(click_count),
            buttons: Some(1),
        }
    }

    /// Left-button release at the given point.
    #[inline]
    #[must_use]
    pub fn mouse_released(x: f64, y: f64, click_count: u32) -> Self {
        Self::DispatchMouseEvent {
            kind: "mouseReleased",
            x,
            y,
            button: Some("left"),
            click_count: Some(click_count),
            buttons: Some(0),
        }
    }
}

// ============================================================================
// DOM Commands
// ============================================================================

/// DOM domain.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum DomCommand {
    /// Enable DOM events.
    #[serde(rename = "DOM.enable")]
    Enable,
}

// ============================================================================
// Browser Commands
// ============================================================================

/// Browser domain.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowserCommand {
    /// Request graceful browser shutdown.
    #[serde(rename = "Browser.close")]
    Close,
}

// ============================================================================
// Tests
// ============================================================================
