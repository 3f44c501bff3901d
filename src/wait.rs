//! Retry-until-ready polling primitive.
//!
//! [`wait_for`] is the sole retry and cancellation mechanism in the crate:
//! every interaction that must wait for the page (element visibility,
//! lifecycle milestones, assertion predicates) loops through it. There is
//! no external cancellation token; callers cancel only by letting the
//! timeout expire.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default overall deadline (30s).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default pause between predicate attempts (100ms).
pub const DEFAULT_INTERVAL_MS: u64 = 100;

// ============================================================================
// WaitOptions
// ============================================================================

/// Configuration for one [`wait_for`] invocation.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Overall deadline in milliseconds.
    pub timeout_ms: u64,
    /// Pause between predicate attempts in milliseconds.
    pub interval_ms: u64,
    /// What is being waited on; embedded in the timeout error message.
    pub description: String,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            interval_ms: DEFAULT_INTERVAL_MS,
            description: String::new(),
        }
    }
}

impl WaitOptions {
    /// Creates options with a description and default timings.
    #[must_use]
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the pause between attempts.
    #[must_use]
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }
}

// ============================================================================
// wait_for
// ============================================================================

/// Polls `predicate` until it yields a value or the deadline passes.
///
/// The predicate reports readiness by returning `Ok(Some(value))`.
/// `Ok(None)` means "not ready yet"; an `Err` is also treated as not
/// ready and retained, so a flapping page never aborts the wait early.
/// On deadline the retained error (if any) becomes the cause of the
/// returned [`Error::WaitTimeout`].
///
/// # Errors
///
/// Returns [`Error::WaitTimeout`] once `timeout_ms` elapses without a
/// truthy predicate result.
pub async fn wait_for<T, F, Fut>(mut predicate: F, options: WaitOptions) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);
    let interval = Duration::from_millis(options.interval_ms);

    let mut last_error: Option<Error> = None;
    while Instant::now() < deadline {
        match predicate().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => {
                trace!(error = %err, description = %options.description, "predicate not ready");
                last_error = Some(err);
            }
        }
        tokio::time::sleep(interval).await;
    }

    Err(Error::wait_timeout(
        options.description,
        options.timeout_ms,
        last_error,
    ))
}

// ============================================================================
// Tests
// ============================================================================
