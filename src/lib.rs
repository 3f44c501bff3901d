//! Chromium Automaton - browser automation over the Chrome DevTools Protocol.
//!
//! This library drives a Chromium instance over its DevTools WebSocket:
//! it launches the process, multiplexes sessions over one connection,
//! mirrors the frame tree from protocol events, and exposes high-level
//! page interactions plus a retrying assertion engine for browser tests.
//!
//! # Architecture
//!
//! One launched browser maps onto a small ownership chain:
//!
//! - [`Browser`] owns the shared [`transport::Connection`] and the process
//! - [`Page`] wraps one attached session and mirrors its frame tree
//! - [`Frame`] executes queries and input gestures in one frame's context
//!
//! Key design principles:
//!
//! - One WebSocket, flat sessions: every page shares the connection,
//!   routed by session id
//! - Event-driven frame state: the frame tree is rebuilt from protocol
//!   notifications, never polled
//! - Reads never error on absence: a missing element yields `None`
//! - Assertions retry: matchers poll until the expectation holds or the
//!   timeout produces a diagnosable failure
//!
//! # Quick Start
//!
//! ```no_run
//! use chromium_automaton::{ClickOptions, GotoOptions, Launcher, Result};
//! use chromium_automaton::assert::{ExpectOptions, expect};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Executable taken from CHROMIUM_AUTOMATON_EXECUTABLE_PATH
//!     let browser = Launcher::new().launch().await?;
//!     let page = browser.new_page(None).await?;
//!
//!     page.goto("https://example.com", GotoOptions::default()).await?;
//!     page.click("#submit", ClickOptions::default()).await?;
//!
//!     expect(&page)
//!         .element("#status", ExpectOptions::default())?
//!         .to_have_text("done")
//!         .await?;
//!
//!     browser.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`assert`] | Retrying matchers: [`assert::expect`], `.not()` negation |
//! | [`browser`] | Browser entities: [`Browser`], [`Page`], [`Frame`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Injected action/assertion notification sinks |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`launcher`] | Process launch and endpoint discovery |
//! | [`policy`] | Navigation and filesystem guards |
//! | [`protocol`] | DevTools message types (internal) |
//! | [`transport`] | WebSocket transport layer (internal) |
//! | [`wait`] | The polling primitive behind every retry |

// ============================================================================
// Modules
// ============================================================================

/// Retrying assertion engine.
///
/// Build expectations with [`assert::expect`]; every matcher polls until
/// it passes or fails with selector, timeout, and last observed state.
pub mod assert;

/// Browser entities: Browser, BrowsingContext, Page, Frame.
///
/// This module contains the core types for browser automation:
///
/// - [`Browser`] - launched instance (owns connection and process)
/// - [`BrowsingContext`] - isolated storage/cookie namespace
/// - [`Page`] - attached target mirroring its frame tree
/// - [`Frame`] - queries and input gestures in one frame
/// - [`Locator`] - a selector bound to a frame for repeated use
pub mod browser;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Action and assertion notifications.
///
/// Sinks are injected at construction; there is no global event bus.
pub mod events;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Chromium process launch and endpoint discovery.
///
/// Use [`Launcher::new`] to launch, or [`Launcher::attach`]
/// to connect to an already-running endpoint.
pub mod launcher;

/// Navigation and filesystem guards.
pub mod policy;

/// DevTools protocol message types.
///
/// Internal module defining command/response/event structures.
pub mod protocol;

/// WebSocket transport layer.
///
/// Internal module multiplexing sessions over one connection.
pub mod transport;

/// Retry-until-ready polling primitive.
pub mod wait;

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{
    Browser, BrowsingContext, CleanupFn, ClickOptions, ElementBox, ElementHandle, Frame,
    FrameQuery, GotoOptions, Locator, Page, ScreenshotFormat, ScreenshotOptions,
    SelectorOptions, TypeOptions, WaitUntil,
};

// Assertions
pub use assert::{Expect, ExpectOptions, Expected, expect, expect_frame};

// Launch
pub use launcher::Launcher;

// Events
pub use events::{AutomationEvent, EventPhase, EventSink, NullSink, RecordingSink, TracingSink};

// Policy
pub use policy::NavigationPolicy;

// Errors
pub use error::{AssertionError, Error, Result};

// Waiting
pub use wait::{WaitOptions, wait_for};
