//! Session handle scoping calls to one attached target.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::identifiers::SessionId;
use crate::protocol::Command;

use super::connection::{Connection, EventListener, ListenerSet};

// ============================================================================
// Session
// ============================================================================

/// Handle to one attached target.
///
/// A session borrows the shared [`Connection`]: [`Session::send`] tags
/// every call with the session id, and [`Session::on`] subscribes to
/// notifications the browser scoped to this session. Cloning is cheap
/// and clones share the listener set.
#[derive(Clone)]
pub struct Session {
    session_id: SessionId,
    connection: Arc<Connection>,
    listeners: ListenerSet,
}

impl Session {
    pub(crate) fn new(
        session_id: SessionId,
        connection: Arc<Connection>,
        listeners: ListenerSet,
    ) -> Self {
        Self {
            session_id,
            connection,
            listeners,
        }
    }

    /// This session's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.session_id
    }

    /// The underlying shared connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Issues a session-scoped call and awaits its response.
    ///
    /// # Errors
    ///
    /// Propagates the connection's errors; see [`Connection::send`].
    pub async fn send(&self, command: Command) -> Result<Value> {
        self.connection.send(command, Some(&self.session_id)).await
    }

    /// Registers a listener for this session's notifications.
    ///
    /// Listeners run on the connection's reader task in registration
    /// order, so they observe events exactly as the browser emitted
    /// them.
    pub fn on(&self, listener: EventListener) {
        self.listeners.lock().push(listener);
    }

    /// Detaches this session from notification routing.
    pub fn detach(&self) {
        self.connection.remove_session(&self.session_id);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .finish()
    }
}
