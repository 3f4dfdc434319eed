use super::error::{RpcError, RpcResult};
use super::message::{
    ADD_URI, CHANGE_GLOBAL_OPTION, GET_GLOBAL_STAT, GET_VERSION, GlobalStat, IncomingMessage,
    RpcNotification, RpcRequest, TELL_ACTIVE, TELL_STATUS, TaskStatus,
};
use super::pending::response_outcome;
use super::socket::SocketConnection;
use crate::app::config::RpcServerConfig;
use crate::util::net::{is_loopback_url, is_plaintext_scheme, to_http_url, to_socket_url};
use serde_json::{Map, Value, json};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};

/// Process-wide id source; ids are never reused
static NEXT_RPC_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_RPC_ID.fetch_add(1, Ordering::SeqCst)
}

/// Connection parameters for one Aria2 daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub name: String,
    pub url: String,
    pub secret: String,
    pub ignore_insecure_warning: bool,
}

impl RpcEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            secret: secret.into(),
            ignore_insecure_warning: false,
        }
    }
}

impl From<&RpcServerConfig> for RpcEndpoint {
    fn from(server: &RpcServerConfig) -> Self {
        Self {
            name: server.name.clone(),
            url: server.url.clone(),
            secret: server.secret.clone(),
            ignore_insecure_warning: server.ignore_insecure_warning,
        }
    }
}

/// Aria2 JSON-RPC client
///
/// Calls go over the persistent WebSocket when one is open and fall back to a
/// one-shot HTTP POST otherwise.
pub struct RpcClient {
    endpoint: RwLock<RpcEndpoint>,
    http: reqwest::Client,
    socket: Mutex<Option<SocketConnection>>,
    notifications: broadcast::Sender<RpcNotification>,
    request_timeout: Duration,
    warned_insecure: AtomicBool,
}

impl RpcClient {
    /// Create a client; the URL is validated before any I/O
    pub fn new(endpoint: RpcEndpoint) -> RpcResult<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    pub fn with_timeout(endpoint: RpcEndpoint, request_timeout: Duration) -> RpcResult<Self> {
        validate_url(&endpoint.url)?;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let (notifications, _) = broadcast::channel(64);

        Ok(Self {
            endpoint: RwLock::new(endpoint),
            http,
            socket: Mutex::new(None),
            notifications,
            request_timeout,
            warned_insecure: AtomicBool::new(false),
        })
    }

    pub fn from_server(server: &RpcServerConfig) -> RpcResult<Self> {
        Self::new(RpcEndpoint::from(server))
    }

    pub fn endpoint(&self) -> RpcEndpoint {
        self.endpoint.read().unwrap().clone()
    }

    pub fn name(&self) -> String {
        self.endpoint.read().unwrap().name.clone()
    }

    /// Replace connection parameters; a changed URL or secret closes the socket
    pub async fn set_endpoint(&self, endpoint: RpcEndpoint) -> RpcResult<()> {
        validate_url(&endpoint.url)?;
        let invalidates = {
            let mut current = self.endpoint.write().unwrap();
            let changed = current.url != endpoint.url || current.secret != endpoint.secret;
            *current = endpoint;
            changed
        };
        if invalidates {
            self.warned_insecure.store(false, Ordering::SeqCst);
            self.close_socket().await;
        }
        Ok(())
    }

    /// Subscribe to server-initiated notifications (socket transport only)
    pub fn subscribe(&self) -> broadcast::Receiver<RpcNotification> {
        self.notifications.subscribe()
    }

    /// Open the persistent connection; no-op when already open to the same URL
    pub async fn open_socket(&self) -> RpcResult<()> {
        let target = to_socket_url(&self.endpoint().url);
        let mut guard = self.socket.lock().await;

        if let Some(conn) = guard.as_ref() {
            if conn.url() == target && conn.is_open() {
                return Ok(());
            }
        }
        if let Some(stale) = guard.take() {
            stale.close();
        }

        let conn = SocketConnection::connect(&target, self.notifications.clone()).await?;
        *guard = Some(conn);
        Ok(())
    }

    /// Close the persistent connection and fail its outstanding calls
    pub async fn close_socket(&self) {
        if let Some(conn) = self.socket.lock().await.take() {
            conn.close();
        }
    }

    pub async fn is_socket_open(&self) -> bool {
        self.socket
            .lock()
            .await
            .as_ref()
            .map(|c| c.is_open())
            .unwrap_or(false)
    }

    /// Send one JSON-RPC call and wait for its correlated response
    pub async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        let endpoint = self.endpoint();
        let id = next_id();
        let request = RpcRequest::new(id, method, params, &endpoint.secret);
        self.warn_if_insecure(&endpoint);
        tracing::trace!("RPC -> {}: {}", endpoint.name, request.redacted());

        let payload = serde_json::to_string(&request)?;

        let waiter = {
            let guard = self.socket.lock().await;
            match guard.as_ref().filter(|c| c.is_open()) {
                Some(conn) => Some((conn.send_call(id, payload.clone())?, conn.pending().clone())),
                None => None,
            }
        };

        let result = match waiter {
            Some((rx, pending)) => match tokio::time::timeout(self.request_timeout, rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(RpcError::ConnectionClosed),
                Err(_) => {
                    pending.forget(id);
                    Err(RpcError::Timeout {
                        method: method.to_string(),
                        timeout_ms: self.request_timeout.as_millis() as u64,
                    })
                }
            },
            None => self.post(&endpoint.url, payload).await,
        };

        match &result {
            Ok(value) => tracing::trace!("RPC <- {} #{}: {}", endpoint.name, id, value),
            Err(e) => tracing::debug!("RPC {} #{} on {} failed: {}", method, id, endpoint.name, e),
        }
        result
    }

    /// One-shot HTTP transport
    async fn post(&self, url: &str, payload: String) -> RpcResult<Value> {
        let http_url = to_http_url(url);
        let response = self
            .http
            .post(&http_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<IncomingMessage>(&body) {
            Ok(message) if message.result.is_some() || message.error.is_some() => {
                response_outcome(message)
            }
            _ if !status.is_success() => Err(RpcError::HttpStatus {
                status: status.as_u16(),
                url: http_url,
            }),
            _ => Err(RpcError::InvalidResponse(body)),
        }
    }

    fn warn_if_insecure(&self, endpoint: &RpcEndpoint) {
        if endpoint.ignore_insecure_warning
            || endpoint.secret.is_empty()
            || !is_plaintext_scheme(&endpoint.url)
            || is_loopback_url(&endpoint.url)
        {
            return;
        }
        if !self.warned_insecure.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                "RPC secret for '{}' is sent unencrypted to {}",
                endpoint.name,
                endpoint.url
            );
        }
    }

    // ========== Convenience Methods ==========

    /// `aria2.addUri`; returns the new task's GID
    pub async fn add_uri(&self, uris: Vec<String>, options: Map<String, Value>) -> RpcResult<String> {
        let value = self
            .call(ADD_URI, vec![json!(uris), Value::Object(options)])
            .await?;
        into_typed(value)
    }

    /// `aria2.getGlobalStat`
    pub async fn get_global_stat(&self) -> RpcResult<GlobalStat> {
        let value = self.call(GET_GLOBAL_STAT, vec![]).await?;
        into_typed(value)
    }

    /// `aria2.tellStatus` restricted to `keys` (all keys when empty)
    pub async fn tell_status(&self, gid: &str, keys: &[&str]) -> RpcResult<TaskStatus> {
        let mut params = vec![json!(gid)];
        if !keys.is_empty() {
            params.push(json!(keys));
        }
        let value = self.call(TELL_STATUS, params).await?;
        into_typed(value)
    }

    /// `aria2.tellActive` restricted to `keys`
    pub async fn tell_active(&self, keys: &[&str]) -> RpcResult<Vec<TaskStatus>> {
        let params = if keys.is_empty() { vec![] } else { vec![json!(keys)] };
        let value = self.call(TELL_ACTIVE, params).await?;
        into_typed(value)
    }

    /// `aria2.changeGlobalOption`
    pub async fn change_global_option(&self, options: Map<String, Value>) -> RpcResult<String> {
        let value = self
            .call(CHANGE_GLOBAL_OPTION, vec![Value::Object(options)])
            .await?;
        into_typed(value)
    }

    /// `aria2.getVersion`
    pub async fn get_version(&self) -> RpcResult<Value> {
        self.call(GET_VERSION, vec![]).await
    }
}

fn into_typed<T: serde::de::DeserializeOwned>(value: Value) -> RpcResult<T> {
    serde_json::from_value(value).map_err(RpcError::from)
}

fn validate_url(url: &str) -> RpcResult<()> {
    if crate::app::settings::is_valid_rpc_url(url) {
        Ok(())
    } else {
        Err(RpcError::InvalidUrl(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_rejected_before_io() {
        let result = RpcClient::new(RpcEndpoint::new("bad", "localhost:6800", ""));
        assert!(matches!(result, Err(RpcError::InvalidUrl(_))));
    }

    #[test]
    fn test_ids_strictly_increase() {
        let ids: Vec<u64> = (0..100).map(|_| next_id()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_set_endpoint_validates() {
        let client =
            RpcClient::new(RpcEndpoint::new("a", "http://localhost:6800/jsonrpc", "")).unwrap();
        let err = client
            .set_endpoint(RpcEndpoint::new("a", "nonsense", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::InvalidUrl(_)));
        assert_eq!(client.endpoint().url, "http://localhost:6800/jsonrpc");
    }

    #[tokio::test]
    async fn test_socket_closed_by_default() {
        let client =
            RpcClient::new(RpcEndpoint::new("a", "http://localhost:6800/jsonrpc", "")).unwrap();
        assert!(!client.is_socket_open().await);
        client.close_socket().await;
    }
}
