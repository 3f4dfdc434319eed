/// Loopback TCP bridge between the daemon and a browser shim.
///
/// Listens on `127.0.0.1:<port>`. Each connection is handled in its own tokio
/// task and speaks newline-delimited JSON. A connection that sent `subscribe`
/// additionally receives every [`HostCommand`] the host emits.
use super::protocol::{BRIDGE_HOST, BridgeEnvelope, BridgeRequest, BridgeResponse, HostCommand};
use crate::capture::CaptureEngine;
use crate::host::headless::HeadlessHost;
use anyhow::{Context, Result};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// What a bridge connection can reach
#[derive(Clone)]
pub struct BridgeContext {
    pub host: Arc<HeadlessHost>,
    pub capture: Arc<CaptureEngine>,
    /// Required token; empty disables the check
    pub token: String,
}

/// Start the bridge server.
///
/// Returns the bound address (port 0 picks a free one) and the accept task.
pub async fn start_bridge_server(
    port: u16,
    context: BridgeContext,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind((BRIDGE_HOST, port))
        .await
        .with_context(|| format!("Failed to bind bridge on {}:{}", BRIDGE_HOST, port))?;
    let addr = listener.local_addr()?;
    tracing::info!("Bridge listening on {}", addr);

    let handle = tokio::spawn(async move {
        accept_loop(listener, context).await;
    });
    Ok((addr, handle))
}

async fn accept_loop(listener: TcpListener, context: BridgeContext) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!("Failed to accept bridge connection: {}", e);
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        tracing::info!("Bridge client connected from {}", peer);
        let context = context.clone();
        tokio::spawn(async move {
            handle_client(stream, context).await;
            tracing::info!("Bridge client {} disconnected", peer);
        });
    }
}

/// Serve one connection until it closes
async fn handle_client(stream: TcpStream, context: BridgeContext) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut commands: Option<broadcast::Receiver<HostCommand>> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Bridge read failed: {}", e);
                        break;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let response = match serde_json::from_str::<BridgeEnvelope>(line) {
                    Ok(envelope) => {
                        let subscribe = envelope.request == BridgeRequest::Subscribe;
                        let response = process_request(envelope, &context);
                        if subscribe && matches!(response, BridgeResponse::Ok { .. }) {
                            commands.get_or_insert_with(|| context.host.commands());
                        }
                        response
                    }
                    Err(e) => {
                        tracing::warn!("Invalid bridge message: {} (raw: {})", e, line);
                        BridgeResponse::Error {
                            message: format!("Invalid message: {}", e),
                        }
                    }
                };

                if write_line(&mut writer, &response).await.is_err() {
                    break;
                }
            }
            command = next_command(&mut commands) => {
                match command {
                    Ok(command) => {
                        if write_line(&mut writer, &command).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Bridge client lagged, {} commands dropped", skipped);
                    }
                    Err(RecvError::Closed) => commands = None,
                }
            }
        }
    }
}

/// Next command for a subscribed connection; pends forever otherwise
async fn next_command(
    commands: &mut Option<broadcast::Receiver<HostCommand>>,
) -> Result<HostCommand, RecvError> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!("Failed to serialize bridge message: {}", e);
            return Ok(());
        }
    };
    json.push('\n');

    writer.write_all(json.as_bytes()).await.inspect_err(|e| {
        tracing::warn!("Failed to write bridge message: {}", e);
    })
}

/// Process a single request and return the reply
fn process_request(envelope: BridgeEnvelope, context: &BridgeContext) -> BridgeResponse {
    if !context.token.is_empty() && envelope.token != context.token {
        tracing::warn!("Bridge request rejected: bad token");
        return BridgeResponse::Error {
            message: "unauthorized".to_string(),
        };
    }

    match envelope.request {
        BridgeRequest::DownloadDetermined { event } => {
            tracing::info!("Bridge received download {}: {}", event.id, event.url);
            let id = event.id;
            match context.host.emit_download(event) {
                0 => BridgeResponse::Skipped {
                    reason: "capture disabled".to_string(),
                },
                _ => BridgeResponse::Ok {
                    message: format!("download {} queued", id),
                },
            }
        }
        BridgeRequest::ActiveTab { url } => {
            tracing::debug!("Active tab: {:?}", url);
            context.capture.set_active_tab(url);
            BridgeResponse::Ok {
                message: "active tab updated".to_string(),
            }
        }
        BridgeRequest::Subscribe => BridgeResponse::Ok {
            message: "subscribed".to_string(),
        },
        BridgeRequest::Ping => BridgeResponse::Pong,
    }
}
