//! Wire envelopes for the DevTools protocol.
//!
//! Three message shapes travel over the one socket:
//!
//! | Shape | Fields | Meaning |
//! |-------|--------|---------|
//! | request | `id`, `method`, `params`, `sessionId?` | local to remote call |
//! | response | `id`, `result` or `error` | answer to a call |
//! | notification | `method`, `params`, `sessionId?` | unsolicited event |
//!
//! A response is recognized by the presence of `id`; a notification by
//! its absence. A notification with a `sessionId` is scoped to one
//! attached target, otherwise it is process-global.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{CallId, SessionId};

use super::Command;

// ============================================================================
// CdpCall
// ============================================================================

/// An outgoing protocol call.
#[derive(Debug, Clone, Serialize)]
pub struct CdpCall {
    /// Correlation id, unique for the connection's lifetime.
    pub id: CallId,

    /// Method and params.
    #[serde(flatten)]
    pub command: Command,

    /// Target session, when the call is session-scoped.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl CdpCall {
    /// Creates a call envelope.
    #[inline]
    #[must_use]
    pub fn new(id: CallId, command: Command, session_id: Option<SessionId>) -> Self {
        Self {
            id,
            command,
            session_id,
        }
    }
}

// ============================================================================
// CdpMessage
// ============================================================================

/// Any incoming message, before shape classification.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpMessage {
    /// Present on responses.
    #[serde(default)]
    pub id: Option<CallId>,

    /// Present on successful responses.
    #[serde(default)]
    pub result: Option<Value>,

    /// Present on failed responses.
    #[serde(default)]
    pub error: Option<CdpErrorEnvelope>,

    /// Present on notifications.
    #[serde(default)]
    pub method: Option<String>,

    /// Notification payload.
    #[serde(default)]
    pub params: Option<Value>,

    /// Present when the message is scoped to an attached target.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

/// Error payload embedded in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorEnvelope {
    /// Error message from the remote.
    pub message: String,

    /// Protocol error code, when supplied.
    #[serde(default)]
    pub code: Option<i64>,
}

/// Classified incoming message.
#[derive(Debug)]
pub enum MessageKind {
    /// Answer to an outstanding call.
    Response {
        /// The call this answers.
        id: CallId,
        /// Result value, or the remote's error envelope.
        outcome: Result<Value, CdpErrorEnvelope>,
    },

    /// Unsolicited event.
    Notification {
        /// Event method, e.g. `Page.frameNavigated`.
        method: String,
        /// Event payload.
        params: Value,
        /// Owning session, if target-scoped.
        session_id: Option<SessionId>,
    },

    /// A message matching no known shape.
    Malformed,
}

impl CdpMessage {
    /// Classifies this message by shape.
    #[must_use]
    pub fn into_kind(self) -> MessageKind {
        if let Some(id) = self.id {
            let outcome = match self.error {
                Some(error) => Err(error),
                None => Ok(self.result.unwrap_or(Value::Null)),
            };
            return MessageKind::Response { id, outcome };
        }

        if let Some(method) = self.method {
            return MessageKind::Notification {
                method,
                params: self.params.unwrap_or(Value::Null),
                session_id: self.session_id,
            };
        }

        MessageKind::Malformed
    }
}

// ============================================================================
// Tests
// ============================================================================
