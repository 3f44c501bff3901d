//! Error types for chromium-automaton.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chromium_automaton::{Result, Error};
//!
//! async fn example(page: &Page) -> Result<()> {
//!     page.goto("https://example.com", GotoOptions::default()).await?;
//!     page.click("#submit", ClickOptions::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Protocol | [`Error::Protocol`] |
//! | Polling | [`Error::WaitTimeout`] |
//! | Assertions | [`Error::Assertion`] |
//! | Navigation policy | [`Error::DisallowedUrl`], [`Error::InvalidUrl`], [`Error::PathEscapesRoot`] |
//! | State | [`Error::State`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | Process | [`Error::ProcessLaunchFailed`], [`Error::ExecutableNotFound`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// AssertionError
// ============================================================================

/// A semantic expectation that survived retrying until its timeout.
///
/// Produced only by the assertion engine after the polling primitive
/// times out. Carries the selector, the configured timeout, and the
/// last observed value so failures are diagnosable without a rerun.
#[derive(Error, Debug)]
#[error("{message} (selector={selector:?}, timeout={timeout_ms:?}ms)")]
pub struct AssertionError {
    /// Human-readable expectation description.
    pub message: String,
    /// Selector the expectation was bound to, if any.
    pub selector: Option<String>,
    /// Configured timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Last value observed before the timeout.
    pub last_state: Option<serde_json::Value>,
}

impl AssertionError {
    /// Creates an assertion error with full failure context.
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        selector: Option<String>,
        timeout_ms: Option<u64>,
        last_state: Option<serde_json::Value>,
    ) -> Self {
        Self {
            message: message.into(),
            selector,
            timeout_ms,
            last_state,
        }
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote returned an error envelope for a protocol call.
    ///
    /// Carries the embedded error message verbatim.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error message from the remote end.
        message: String,
    },

    // ========================================================================
    // Polling Errors
    // ========================================================================
    /// The polling primitive exhausted its retries.
    ///
    /// The most recent predicate error, if any, is retained as the cause.
    #[error("Timeout after {timeout_ms}ms: {description}")]
    WaitTimeout {
        /// What was being waited on.
        description: String,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
        /// Last error raised by the predicate, if any.
        #[source]
        cause: Option<Box<Error>>,
    },

    // ========================================================================
    // Assertion Errors
    // ========================================================================
    /// A retrying matcher failed to observe its expected state in time.
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    // ========================================================================
    // Navigation Policy Errors
    // ========================================================================
    /// A navigation target's scheme is not permitted by policy.
    #[error("URL scheme not allowed: {scheme} ({url})")]
    DisallowedUrl {
        /// The rejected URL.
        url: String,
        /// Its scheme.
        scheme: String,
    },

    /// A navigation target could not be parsed as a URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// The unparseable input.
        url: String,
    },

    /// A filesystem target resolves outside the permitted root.
    #[error("Path escapes root: {path}")]
    PathEscapesRoot {
        /// The offending path.
        path: PathBuf,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// An operation was invoked against a missing or uninitialized frame.
    #[error("State error: {message}")]
    State {
        /// Description of the missing state.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The transport closed while calls were still outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Process Errors
    // ========================================================================
    /// Browser executable not found at path.
    #[error("Chromium executable not found: {path}")]
    ExecutableNotFound {
        /// Path where the executable was expected.
        path: PathBuf,
    },

    /// Failed to launch or handshake with the browser process.
    #[error("Failed to launch Chromium: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error talking to the DevTools metadata endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a wait timeout error.
    #[inline]
    pub fn wait_timeout(
        description: impl Into<String>,
        timeout_ms: u64,
        cause: Option<Error>,
    ) -> Self {
        Self::WaitTimeout {
            description: description.into(),
            timeout_ms,
            cause: cause.map(Box::new),
        }
    }

    /// Creates a disallowed-URL error.
    #[inline]
    pub fn disallowed_url(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::DisallowedUrl {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    /// Creates an invalid-URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a path-escape error.
    #[inline]
    pub fn path_escapes_root(path: impl Into<PathBuf>) -> Self {
        Self::PathEscapesRoot { path: path.into() }
    }

    /// Creates a state error.
    #[inline]
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an executable-not-found error.
    #[inline]
    pub fn executable_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ExecutableNotFound { path: path.into() }
    }

    /// Creates a process launch failure.
    #[inline]
    pub fn process_launch_failed(message: impl Into<String>) -> Self {
        Self::ProcessLaunchFailed {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is an assertion failure.
    #[inline]
    #[must_use]
    pub fn is_assertion_error(&self) -> bool {
        matches!(self, Self::Assertion(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
