//! WebSocket connection with call correlation and session routing.
//!
//! One [`Connection`] owns the single WebSocket to the browser process.
//! Every in-process consumer (pages, frames, the launcher's shutdown
//! path) shares it; calls are correlated by a monotonically increasing
//! id, and incoming traffic is dispatched from one reader task:
//!
//! - responses complete the oneshot parked under their id
//! - session-scoped notifications go to that session's listeners
//! - sessionless notifications go to the global listeners
//!
//! Listener callbacks run on the reader task, so each consumer observes
//! notifications in exactly the order the browser emitted them.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CallId, SessionId};
use crate::protocol::{CdpCall, CdpMessage, Command, MessageKind};

use super::session::Session;

// ============================================================================
// Types
// ============================================================================

/// Notification callback: `(method, params)`.
pub type EventListener = Box<dyn Fn(&str, &Value) + Send + Sync>;

/// Ordered listeners sharing one dispatch point.
pub(crate) type ListenerSet = Arc<Mutex<Vec<EventListener>>>;

type PendingMap = Arc<Mutex<FxHashMap<CallId, oneshot::Sender<Result<Value>>>>>;
type SessionMap = Arc<Mutex<FxHashMap<SessionId, ListenerSet>>>;

enum LoopCommand {
    Send { text: String },
    Close,
}

// ============================================================================
// Connection
// ============================================================================

/// Shared connection to the browser's remote-debugging socket.
pub struct Connection {
    command_tx: mpsc::UnboundedSender<LoopCommand>,
    next_id: AtomicU64,
    pending: PendingMap,
    sessions: SessionMap,
    global_listeners: ListenerSet,
}

impl Connection {
    /// Connects to a `ws://` debugger URL and starts the reader task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the WebSocket handshake fails.
    pub async fn connect(url: &str) -> Result<Arc<Self>> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("handshake with {url} failed: {e}")))?;

        debug!(url, "connected to debugger socket");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            command_tx,
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(FxHashMap::default())),
            sessions: Arc::new(Mutex::new(FxHashMap::default())),
            global_listeners: Arc::new(Mutex::new(Vec::new())),
        });

        tokio::spawn(run_event_loop(
            stream,
            command_rx,
            connection.pending.clone(),
            connection.sessions.clone(),
            connection.global_listeners.clone(),
        ));

        Ok(connection)
    }

    /// Issues a call and awaits its response.
    ///
    /// The call is tagged with the next id from the connection-wide
    /// counter; the response is matched back by that id regardless of
    /// arrival order. There is no per-call deadline here: the remote
    /// cannot cancel an in-flight call, so callers bound slow pages
    /// with the polling primitive instead.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the remote answers with an error envelope.
    /// - [`Error::ConnectionClosed`] if the socket closes first.
    pub async fn send(&self, command: Command, session_id: Option<&SessionId>) -> Result<Value> {
        let id = CallId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let call = CdpCall::new(id, command, session_id.cloned());
        let text = serde_json::to_string(&call)?;

        let (response_tx, response_rx) = oneshot::channel();
        self.pending.lock().insert(id, response_tx);

        trace!(id = id.value(), "sending call");
        if self.command_tx.send(LoopCommand::Send { text }).is_err() {
            self.pending.lock().remove(&id);
            return Err(Error::ConnectionClosed);
        }

        match response_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Registers a listener for sessionless notifications.
    pub fn on_global(&self, listener: EventListener) {
        self.global_listeners.lock().push(listener);
    }

    /// Creates a [`Session`] handle routing calls and notifications
    /// through this connection under `session_id`.
    #[must_use]
    pub fn create_session(self: &Arc<Self>, session_id: SessionId) -> Session {
        let listeners: ListenerSet = Arc::new(Mutex::new(Vec::new()));
        self.sessions
            .lock()
            .insert(session_id.clone(), listeners.clone());
        Session::new(session_id, self.clone(), listeners)
    }

    /// Stops routing notifications for a session.
    pub fn remove_session(&self, session_id: &SessionId) {
        self.sessions.lock().remove(session_id);
    }

    /// Closes the socket. Outstanding calls fail with
    /// [`Error::ConnectionClosed`].
    pub fn close(&self) {
        let _ = self.command_tx.send(LoopCommand::Close);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("pending", &self.pending.lock().len())
            .field("sessions", &self.sessions.lock().len())
            .finish()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

async fn run_event_loop(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut command_rx: mpsc::UnboundedReceiver<LoopCommand>,
    pending: PendingMap,
    sessions: SessionMap,
    global_listeners: ListenerSet,
) {
    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(LoopCommand::Send { text }) => {
                    if let Err(e) = stream.send(Message::Text(text.into())).await {
                        warn!(error = %e, "socket write failed");
                        break;
                    }
                }
                Some(LoopCommand::Close) | None => {
                    let _ = stream.close(None).await;
                    break;
                }
            },

            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_incoming_message(&text, &pending, &sessions, &global_listeners);
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("socket closed by remote");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "socket read failed");
                    break;
                }
            },
        }
    }

    fail_pending_requests(&pending);
}

fn handle_incoming_message(
    text: &str,
    pending: &PendingMap,
    sessions: &SessionMap,
    global_listeners: &ListenerSet,
) {
    let message: CdpMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "unparseable frame");
            return;
        }
    };

    match message.into_kind() {
        MessageKind::Response { id, outcome } => {
            let Some(response_tx) = pending.lock().remove(&id) else {
                // Late answer to a caller that already gave up.
                trace!(id = id.value(), "response for unknown call id");
                return;
            };
            let outcome = outcome.map_err(|envelope| Error::protocol(envelope.message));
            let _ = response_tx.send(outcome);
        }

        MessageKind::Notification {
            method,
            params,
            session_id,
        } => {
            let listeners = match session_id {
                Some(session_id) => sessions.lock().get(&session_id).cloned(),
                None => Some(global_listeners.clone()),
            };
            let Some(listeners) = listeners else {
                trace!(method, "notification for detached session");
                return;
            };
            for listener in listeners.lock().iter() {
                listener(&method, &params);
            }
        }

        MessageKind::Malformed => warn!("frame matches no known shape"),
    }
}

fn fail_pending_requests(pending: &PendingMap) {
    let drained: Vec<_> = pending.lock().drain().collect();
    if !drained.is_empty() {
        debug!(count = drained.len(), "failing outstanding calls");
    }
    for (_, response_tx) in drained {
        let _ = response_tx.send(Err(Error::ConnectionClosed));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    use crate::protocol::{PageCommand, RuntimeCommand};
    use crate::test_support::{ScriptedServer, reply, reply_err};

    #[tokio::test]
    async fn test_call_gets_matching_response() {
        let server = ScriptedServer::spawn(|call| {
            assert_eq!(call.method, "Page.navigate");
            vec![reply(call.id, json!({"frameId": "F1"}))]
        })
        .await;

        let connection = Connection::connect(&server.url()).await.expect("connect");
        let result = connection
            .send(
                Command::Page(PageCommand::Navigate {
                    url: "https://example.com".to_string(),
                }),
                None,
            )
            .await
            .expect("response");

        assert_eq!(result["frameId"], "F1");
    }

    #[tokio::test]
    async fn test_out_of_order_responses_correlate_by_id() {
        // Hold the first call's answer until the second call arrives,
        // then answer both in reverse order.
        let server = ScriptedServer::spawn({
            let mut held: Option<u64> = None;
            move |call| match held.take() {
                None => {
                    held = Some(call.id);
                    vec![]
                }
                Some(first) => vec![
                    reply(call.id, json!({"n": 2})),
                    reply(first, json!({"n": 1})),
                ],
            }
        })
        .await;

        let connection = Connection::connect(&server.url()).await.expect("connect");

        let first = connection.send(Command::Page(PageCommand::GetFrameTree), None);
        let second = connection.send(Command::Page(PageCommand::GetFrameTree), None);
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.expect("first")["n"], 1);
        assert_eq!(second.expect("second")["n"], 2);
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_protocol_error() {
        let server =
            ScriptedServer::spawn(|call| vec![reply_err(call.id, "No node with given id")]).await;

        let connection = Connection::connect(&server.url()).await.expect("connect");
        let err = connection
            .send(Command::Page(PageCommand::Enable), None)
            .await
            .expect_err("error envelope");

        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("No node with given id"));
    }

    #[tokio::test]
    async fn test_session_notifications_route_to_their_session() {
        let server = ScriptedServer::spawn(|call| vec![reply(call.id, json!({}))]).await;

        let connection = Connection::connect(&server.url()).await.expect("connect");
        let session = connection.create_session(SessionId::new("S1"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        session.on({
            let seen = seen.clone();
            Box::new(move |method, _params| seen.lock().push(method.to_string()))
        });

        let other = Arc::new(AtomicUsize::new(0));
        connection.on_global({
            let other = other.clone();
            Box::new(move |_, _| {
                other.fetch_add(1, Ordering::SeqCst);
            })
        });

        server.push("Page.lifecycleEvent", json!({"frameId": "F1", "name": "load"}), Some("S1"));
        server.push("Page.lifecycleEvent", json!({"frameId": "FX", "name": "load"}), Some("S2"));

        // A round trip after the pushes guarantees they were dispatched.
        session
            .send(Command::Runtime(RuntimeCommand::Enable))
            .await
            .expect("round trip");

        assert_eq!(seen.lock().as_slice(), ["Page.lifecycleEvent"]);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_fails_outstanding_calls() {
        let server = ScriptedServer::spawn(|_call| vec![]).await;

        let connection = Connection::connect(&server.url()).await.expect("connect");
        let in_flight = tokio::spawn({
            let connection = connection.clone();
            async move {
                connection
                    .send(Command::Page(PageCommand::GetFrameTree), None)
                    .await
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        connection.close();

        let err = in_flight.await.expect("task").expect_err("must fail");
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_ids_are_strictly_increasing() {
        let ids = Arc::new(Mutex::new(Vec::new()));
        let server = ScriptedServer::spawn({
            let ids = ids.clone();
            move |call| {
                ids.lock().push(call.id);
                vec![reply(call.id, json!({}))]
            }
        })
        .await;

        let connection = Connection::connect(&server.url()).await.expect("connect");
        for _ in 0..3 {
            connection
                .send(Command::Page(PageCommand::Enable), None)
                .await
                .expect("response");
        }

        let ids = ids.lock();
        assert_eq!(ids.as_slice(), [1, 2, 3]);
    }
}
