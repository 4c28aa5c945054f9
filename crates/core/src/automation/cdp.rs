//! Chrome DevTools Protocol connection.
//!
//! One WebSocket per page target. Commands carry increasing ids and are
//! matched to their responses by a background reader task; events fan out
//! to every subscriber through a broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::error::AutomationError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

/// Events buffered per subscriber before the slowest one starts lagging.
const EVENT_BUFFER: usize = 256;

/// An event pushed by the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Serialize)]
struct CdpCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// A response to one command.
#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpResponseError>,
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// A DevTools WebSocket connection to a single page target.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    writer: Mutex<SplitSink<WsStream, Message>>,
    events: broadcast::Sender<CdpEvent>,
    closed: Arc<AtomicBool>,
    command_timeout: Duration,
    reader: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to `ws://host:port/devtools/page/<id>`.
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self, AutomationError> {
        info!(url = ws_url, "Connecting to DevTools");

        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| AutomationError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            })?;
        let (writer, reader) = stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(Self::read_loop(
            reader,
            Arc::clone(&pending),
            events.clone(),
            Arc::clone(&closed),
        ));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            events,
            closed,
            command_timeout,
            reader,
        })
    }

    /// Send a command with the default timeout.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, AutomationError> {
        self.send_with_timeout(method, params, self.command_timeout)
            .await
    }

    /// Send a command and wait up to `timeout` for its response.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, AutomationError> {
        if self.is_closed() {
            return Err(AutomationError::SessionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpCommand { id, method, params }).map_err(|e| {
            AutomationError::Protocol {
                detail: format!("failed to serialize {method}: {e}"),
            }
        })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        debug!(id, method, "Sending DevTools command");
        let sent = self.writer.lock().await.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(if self.is_closed() {
                AutomationError::SessionClosed
            } else {
                AutomationError::Protocol {
                    detail: format!("failed to send {method}: {e}"),
                }
            });
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(AutomationError::SessionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(AutomationError::timeout(method, timeout));
            }
        };

        if let Some(err) = response.error {
            if self.is_closed() {
                return Err(AutomationError::SessionClosed);
            }
            return Err(AutomationError::Protocol {
                detail: match err.data {
                    Some(data) => format!("{method}: {} ({}): {data}", err.message, err.code),
                    None => format!("{method}: {} ({})", err.message, err.code),
                },
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Enable a domain such as `Page` or `Runtime` so it starts emitting events.
    pub async fn enable_domain(&self, domain: &str) -> Result<(), AutomationError> {
        self.send(&format!("{domain}.enable"), serde_json::json!({}))
            .await
            .map(|_| ())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the WebSocket. Pending commands fail with `SessionClosed`.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.writer.lock().await.close().await;
        fail_pending(&self.pending).await;
        self.reader.abort();
    }

    async fn read_loop(
        mut reader: SplitStream<WsStream>,
        pending: PendingMap,
        events: broadcast::Sender<CdpEvent>,
        closed: Arc<AtomicBool>,
    ) {
        while let Some(message) = reader.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text.to_string(),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => continue,
                },
                Ok(Message::Close(_)) => {
                    info!("DevTools closed the connection");
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "DevTools read failed, stopping reader");
                    break;
                }
            };

            let json: Value = match serde_json::from_str(&text) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed DevTools message");
                    continue;
                }
            };

            if let Some(response) = parse_cdp_response(&json) {
                if let Some(tx) = pending.lock().await.remove(&response.id) {
                    let _ = tx.send(response);
                }
            } else if let Some(event) = parse_cdp_event(&json) {
                // No subscribers is fine.
                let _ = events.send(event);
            }
        }

        closed.store(true, Ordering::SeqCst);
        fail_pending(&pending).await;
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn fail_pending(pending: &PendingMap) {
    for (id, tx) in pending.lock().await.drain() {
        let _ = tx.send(CdpResponse {
            id,
            result: None,
            error: Some(CdpResponseError {
                code: -1,
                message: "connection closed".to_string(),
                data: None,
            }),
        });
    }
}

/// Parse a message carrying an `id` as a command response.
pub fn parse_cdp_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}

/// Parse a message without an `id` as an event.
pub fn parse_cdp_event(json: &Value) -> Option<CdpEvent> {
    if json.get("id").is_some() {
        return None;
    }
    Some(CdpEvent {
        method: json.get("method")?.as_str()?.to_string(),
        params: json.get("params").cloned().unwrap_or(Value::Null),
    })
}
