//! Action and assertion notifications.
//!
//! Every action and retrying assertion emits a paired start/end event so
//! external collaborators (test reporters, tracing) can observe what the
//! engine is doing. The sink is injected at construction; there is no
//! process-global event bus.
//!
//! Sensitive-flagged events carry selectors or values that must not be
//! persisted verbatim by a sink; the engine itself performs no redaction.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::identifiers::FrameId;

// ============================================================================
// AutomationEvent
// ============================================================================

/// Which boundary of which kind of operation an event marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    /// An action is about to run.
    ActionStart,
    /// An action finished (successfully or not).
    ActionEnd,
    /// A retrying assertion began polling.
    AssertionStart,
    /// A retrying assertion stopped polling (pass or fail).
    AssertionEnd,
}

/// A single action or assertion notification.
#[derive(Debug, Clone)]
pub struct AutomationEvent {
    /// Operation boundary.
    pub phase: EventPhase,
    /// Operation name, e.g. `click` or `Expected element to exist`.
    pub name: String,
    /// Selector or URL the operation targeted, if any.
    pub selector: Option<String>,
    /// Frame the operation ran against, if any.
    pub frame_id: Option<FrameId>,
    /// Wall-clock duration; present on end events only.
    pub duration_ms: Option<u64>,
    /// Marks events whose selector/value must not be persisted verbatim.
    pub sensitive: bool,
}

// ============================================================================
// EventSink
// ============================================================================

/// Receiver for action/assertion notifications.
///
/// Implementations must be cheap and non-blocking; events are emitted
/// synchronously on the calling task.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &AutomationEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&self, _event: &AutomationEvent) {}
}

/// Sink that forwards events to `tracing` at debug level.
///
/// Selectors of sensitive events are replaced with `[redacted]` before
/// logging, honoring the sensitive-event contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &AutomationEvent) {
        let selector = if event.sensitive {
            event.selector.as_ref().map(|_| "[redacted]")
        } else {
            event.selector.as_deref()
        };
        debug!(
            phase = ?event.phase,
            name = %event.name,
            selector = selector.unwrap_or(""),
            frame_id = event.frame_id.as_ref().map(FrameId::as_str).unwrap_or(""),
            duration_ms = event.duration_ms,
            "automation event"
        );
    }
}

/// Sink that records events in memory, for tests and reporters.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AutomationEvent>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every event recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<AutomationEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: &AutomationEvent) {
        self.events.lock().push(event.clone());
    }
}

// ============================================================================
// Spans
// ============================================================================

/// Emits a start event on creation and the matching end event on drop.
///
/// Dropping on every exit path guarantees the paired end notification
/// regardless of whether the operation succeeded.
pub(crate) struct OperationSpan {
    sink: Arc<dyn EventSink>,
    end_phase: EventPhase,
    name: String,
    selector: Option<String>,
    frame_id: Option<FrameId>,
    sensitive: bool,
    started: Instant,
}

impl OperationSpan {
    /// Starts an action span.
    pub(crate) fn action(
        sink: Arc<dyn EventSink>,
        name: impl Into<String>,
        selector: Option<String>,
        frame_id: Option<FrameId>,
        sensitive: bool,
    ) -> Self {
        Self::start(
            sink,
            EventPhase::ActionStart,
            EventPhase::ActionEnd,
            name,
            selector,
            frame_id,
            sensitive,
        )
    }

    /// Starts an assertion span.
    pub(crate) fn assertion(
        sink: Arc<dyn EventSink>,
        name: impl Into<String>,
        selector: Option<String>,
        frame_id: Option<FrameId>,
    ) -> Self {
        Self::start(
            sink,
            EventPhase::AssertionStart,
            EventPhase::AssertionEnd,
            name,
            selector,
            frame_id,
            false,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn start(
        sink: Arc<dyn EventSink>,
        start_phase: EventPhase,
        end_phase: EventPhase,
        name: impl Into<String>,
        selector: Option<String>,
        frame_id: Option<FrameId>,
        sensitive: bool,
    ) -> Self {
        let name = name.into();
        sink.on_event(&AutomationEvent {
            phase: start_phase,
            name: name.clone(),
            selector: selector.clone(),
            frame_id: frame_id.clone(),
            duration_ms: None,
            sensitive,
        });
        Self {
            sink,
            end_phase,
            name,
            selector,
            frame_id,
            sensitive,
            started: Instant::now(),
        }
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        self.sink.on_event(&AutomationEvent {
            phase: self.end_phase,
            name: self.name.clone(),
            selector: self.selector.clone(),
            frame_id: self.frame_id.clone(),
            duration_ms: Some(self.started.elapsed().as_millis() as u64),
            sensitive: self.sensitive,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
