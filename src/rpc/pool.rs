//! One long-lived client per configured server, shared by every component

use super::client::{RpcClient, RpcEndpoint};
use super::error::RpcResult;
use crate::app::config::RpcServerConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ClientPool {
    clients: RwLock<HashMap<String, Arc<RpcClient>>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client for `server`, created on first use
    ///
    /// A changed URL or secret is pushed into the existing client, which
    /// drops its socket.
    pub async fn client_for(&self, server: &RpcServerConfig) -> RpcResult<Arc<RpcClient>> {
        let endpoint = RpcEndpoint::from(server);

        if let Some(existing) = self.clients.read().await.get(&server.name).cloned() {
            if existing.endpoint() != endpoint {
                existing.set_endpoint(endpoint).await?;
            }
            return Ok(existing);
        }

        let mut clients = self.clients.write().await;
        // Another task may have inserted it meanwhile
        if let Some(existing) = clients.get(&server.name) {
            return Ok(existing.clone());
        }
        let client = Arc::new(RpcClient::new(endpoint)?);
        clients.insert(server.name.clone(), client.clone());
        Ok(client)
    }

    /// Drop clients whose server is no longer configured
    pub async fn retain_configured(&self, servers: &[RpcServerConfig]) {
        let removed: Vec<Arc<RpcClient>> = {
            let mut clients = self.clients.write().await;
            let stale: Vec<String> = clients
                .keys()
                .filter(|name| !servers.iter().any(|s| &s.name == *name))
                .cloned()
                .collect();
            stale.iter().filter_map(|name| clients.remove(name)).collect()
        };
        for client in removed {
            tracing::debug!("Dropping RPC client '{}'", client.name());
            client.close_socket().await;
        }
    }

    /// Close every persistent connection
    pub async fn close_all(&self) {
        let clients: Vec<Arc<RpcClient>> = self.clients.read().await.values().cloned().collect();
        for client in clients {
            client.close_socket().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
