//! In-process scripted debugger endpoint for tests.
//!
//! [`ScriptedServer`] binds a loopback WebSocket, accepts one
//! connection, and feeds every incoming call through a scripted
//! handler. The handler returns the raw messages to write back, which
//! lets tests answer out of order, withhold answers, or inject error
//! envelopes. [`ScriptedServer::push`] writes unsolicited
//! notifications at any time.

use std::sync::Once;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Installs the log subscriber once per test process.
///
/// Output is captured per test and filtered by `RUST_LOG`; run with
/// `RUST_LOG=chromium_automaton=trace` to see transport traffic.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One incoming call, as the scripted handler sees it.
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub id: u64,
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Scripted loopback debugger endpoint.
pub struct ScriptedServer {
    url: String,
    push_tx: mpsc::UnboundedSender<Value>,
}

impl ScriptedServer {
    /// Binds a loopback port and serves one connection with `handler`.
    pub async fn spawn<H>(mut handler: H) -> Self
    where
        H: FnMut(ScriptedCall) -> Vec<Value> + Send + 'static,
    {
        init_test_logging();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Value>();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(tcp).await.expect("handshake");

            loop {
                tokio::select! {
                    pushed = push_rx.recv() => match pushed {
                        Some(message) => {
                            let text = message.to_string();
                            if ws.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },

                    incoming = ws.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let raw: Value = serde_json::from_str(&text).expect("client json");
                            let call = ScriptedCall {
                                id: raw["id"].as_u64().expect("call id"),
                                method: raw["method"].as_str().expect("method").to_string(),
                                params: raw.get("params").cloned().unwrap_or(Value::Null),
                                session_id: raw
                                    .get("sessionId")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                            };
                            let session_id = call.session_id.clone();

                            for mut message in handler(call) {
                                // Responses inherit the call's session scope.
                                if let Some(session_id) = &session_id
                                    && message.get("sessionId").is_none()
                                {
                                    message["sessionId"] = json!(session_id);
                                }
                                let text = message.to_string();
                                if ws.send(Message::Text(text.into())).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    },
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            push_tx,
        }
    }

    /// The `ws://` URL of this endpoint.
    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Writes an unsolicited notification.
    pub fn push(&self, method: &str, params: Value, session_id: Option<&str>) {
        let mut message = json!({"method": method, "params": params});
        if let Some(session_id) = session_id {
            message["sessionId"] = json!(session_id);
        }
        let _ = self.push_tx.send(message);
    }
}

/// Builds a success response for `id`.
pub fn reply(id: u64, result: Value) -> Value {
    json!({"id": id, "result": result})
}

/// Builds an error response for `id`.
pub fn reply_err(id: u64, message: &str) -> Value {
    json!({"id": id, "error": {"code": -32000, "message": message}})
}
