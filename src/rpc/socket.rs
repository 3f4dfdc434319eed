//! Persistent WebSocket connection to one Aria2 daemon
//!
//! A reader task routes responses to [`PendingCalls`] and forwards
//! server-initiated notifications to a broadcast channel. A writer task owns
//! the sink so callers only ever push into an unbounded queue.

use super::error::{RpcError, RpcResult};
use super::message::{IncomingMessage, RpcNotification};
use super::pending::PendingCalls;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub struct SocketConnection {
    url: String,
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingCalls,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl SocketConnection {
    /// Connect to a `ws://` / `wss://` URL
    pub async fn connect(
        url: &str,
        notifications: broadcast::Sender<RpcNotification>,
    ) -> RpcResult<Self> {
        let (stream, _) = connect_async(url).await?;
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();
        let alive = Arc::new(AtomicBool::new(true));
        let pending = PendingCalls::new();

        let writer_alive = alive.clone();
        tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                if let Err(e) = sink.send(message).await {
                    tracing::warn!("WebSocket send failed: {}", e);
                    break;
                }
            }
            writer_alive.store(false, Ordering::SeqCst);
            let _ = sink.close().await;
        });

        let reader_alive = alive.clone();
        let reader_pending = pending.clone();
        let reader_url = url.to_string();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        dispatch_text(text.as_str(), &reader_pending, &notifications)
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("WebSocket read error on {}: {}", reader_url, e);
                        break;
                    }
                }
            }
            reader_alive.store(false, Ordering::SeqCst);
            reader_pending.fail_all();
            tracing::debug!("WebSocket reader for {} finished", reader_url);
        });

        tracing::info!("WebSocket connected: {}", url);
        Ok(Self {
            url: url.to_string(),
            outgoing,
            pending,
            alive,
            reader,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open and able to accept writes
    pub fn is_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.outgoing.is_closed()
    }

    pub fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    /// Register the waiter for `id` and queue the serialized request
    pub fn send_call(&self, id: u64, payload: String) -> RpcResult<oneshot::Receiver<RpcResult<Value>>> {
        let rx = self.pending.register(id);
        if self.outgoing.send(Message::text(payload)).is_err() {
            self.pending.forget(id);
            return Err(RpcError::ConnectionClosed);
        }
        Ok(rx)
    }

    /// Release the connection and fail anything still waiting
    pub fn close(self) {
        tracing::debug!("Closing WebSocket {}", self.url);
        // Drop runs the teardown
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.reader.abort();
        self.pending.fail_all();
        // The writer exits once `outgoing` is dropped and closes the sink
    }
}

/// Route one text frame: responses by id, everything else as notification
fn dispatch_text(
    text: &str,
    pending: &PendingCalls,
    notifications: &broadcast::Sender<RpcNotification>,
) {
    let message: IncomingMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("Ignoring non-RPC frame ({}): {}", e, text);
            return;
        }
    };

    if message.id.is_some() {
        pending.resolve(message);
        return;
    }

    if let Some(notification) = message.as_notification() {
        tracing::debug!("Aria2 notification: {:?}", notification);
        // No subscribers is fine
        let _ = notifications.send(notification);
    }
}
