//! Correlation of outstanding calls with their responses
//!
//! Responses are matched by `id`, never by send order, so concurrent calls
//! may complete in any order.

use super::error::{RpcError, RpcResult};
use super::message::IncomingMessage;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type Waiter = oneshot::Sender<RpcResult<Value>>;

/// Turn a decoded response into the call outcome
pub fn response_outcome(message: IncomingMessage) -> RpcResult<Value> {
    if let Some(err) = message.error {
        return Err(RpcError::Protocol {
            code: err.code,
            message: err.message,
        });
    }
    message
        .result
        .ok_or_else(|| RpcError::InvalidResponse("missing result".to_string()))
}

/// Calls waiting for a response on a persistent connection
#[derive(Debug, Clone, Default)]
pub struct PendingCalls {
    waiters: Arc<Mutex<HashMap<u64, Waiter>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`
    ///
    /// Ids are never reused, so an existing entry means a caller bug; the
    /// stale waiter is failed rather than silently dropped.
    pub fn register(&self, id: u64) -> oneshot::Receiver<RpcResult<Value>> {
        let (tx, rx) = oneshot::channel();
        let previous = self.waiters.lock().unwrap().insert(id, tx);
        if let Some(stale) = previous {
            tracing::error!("RPC id {} registered twice", id);
            let _ = stale.send(Err(RpcError::InvalidResponse(format!(
                "id {} reused",
                id
            ))));
        }
        rx
    }

    /// Drop the waiter for `id` (timeout or caller gave up)
    pub fn forget(&self, id: u64) {
        self.waiters.lock().unwrap().remove(&id);
    }

    /// Route a response to its waiter; returns false for unknown ids
    pub fn resolve(&self, message: IncomingMessage) -> bool {
        let Some(id) = message.numeric_id() else {
            return false;
        };
        let waiter = self.waiters.lock().unwrap().remove(&id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(response_outcome(message));
                true
            }
            None => {
                tracing::debug!("Dropping response for unknown RPC id {}", id);
                false
            }
        }
    }

    /// Fail every outstanding call; used when the connection goes away
    pub fn fail_all(&self) {
        let drained: Vec<Waiter> = self.waiters.lock().unwrap().drain().map(|(_, tx)| tx).collect();
        if !drained.is_empty() {
            tracing::debug!("Failing {} outstanding RPC calls", drained.len());
        }
        for tx in drained {
            let _ = tx.send(Err(RpcError::ConnectionClosed));
        }
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> IncomingMessage {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_out_of_order_responses_resolve_by_id() {
        let pending = PendingCalls::new();
        let mut first = pending.register(1);
        let second = pending.register(2);

        assert!(pending.resolve(response(r#"{"id":2,"result":"two"}"#)));

        // Call 2 is done while call 1 is still waiting
        assert_eq!(second.await.unwrap().unwrap(), "two");
        assert!(first.try_recv().is_err());
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(response(r#"{"id":1,"result":"one"}"#)));
        assert_eq!(first.await.unwrap().unwrap(), "one");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_error_member_becomes_protocol_error() {
        let pending = PendingCalls::new();
        let rx = pending.register(5);

        pending.resolve(response(
            r#"{"id":"5","error":{"code":1,"message":"Unauthorized"}}"#,
        ));

        match rx.await.unwrap() {
            Err(RpcError::Protocol { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("Expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        let pending = PendingCalls::new();
        let _rx = pending.register(1);
        assert!(!pending.resolve(response(r#"{"id":99,"result":1}"#)));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_all_closes_waiters() {
        let pending = PendingCalls::new();
        let a = pending.register(1);
        let b = pending.register(2);

        pending.fail_all();

        assert!(matches!(a.await.unwrap(), Err(RpcError::ConnectionClosed)));
        assert!(matches!(b.await.unwrap(), Err(RpcError::ConnectionClosed)));
        assert!(pending.is_empty());
    }
}
