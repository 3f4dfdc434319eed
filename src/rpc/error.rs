use thiserror::Error;

/// Errors returned by RPC calls
///
/// Transport failures, protocol-level failures (the response carried an
/// `error` member) and validation failures are kept apart so callers can tell
/// "never reached Aria2" from "Aria2 said no".
#[derive(Error, Debug)]
pub enum RpcError {
    /// RPC URL could not be used; rejected before any I/O
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// HTTP request failed (connection refused, DNS, TLS, ...)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP status without a JSON-RPC body
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// WebSocket connect/send failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Persistent connection dropped while the call was outstanding
    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    /// No response within the request timeout
    #[error("{method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// Response carried a JSON-RPC `error` member
    #[error("Aria2 error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// Response was neither a result nor an error
    #[error("Malformed RPC response: {0}")]
    InvalidResponse(String),

    /// Payload (de)serialization failed
    #[error("Failed to (de)serialize RPC payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for RpcError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Coarse classification used for notifications and the badge title
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcFailureKind {
    /// Wrong or missing secret
    Unauthorized,
    /// Daemon could not be reached
    Unreachable,
    Other,
}

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

impl RpcError {
    /// Create a protocol error
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// True when the call never completed a round-trip
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::HttpStatus { .. }
                | Self::WebSocket(_)
                | Self::ConnectionClosed
                | Self::Timeout { .. }
        )
    }

    /// Classify by error shape and message substring
    pub fn kind(&self) -> RpcFailureKind {
        let text = self.to_string().to_lowercase();
        if text.contains("unauthorized") {
            return RpcFailureKind::Unauthorized;
        }
        if let Self::HttpStatus { status, .. } = self {
            if *status == 401 || *status == 403 {
                return RpcFailureKind::Unauthorized;
            }
        }
        if self.is_transport() {
            return RpcFailureKind::Unreachable;
        }
        RpcFailureKind::Other
    }

    /// Short human-readable reason for notifications
    pub fn reason(&self) -> String {
        match self.kind() {
            RpcFailureKind::Unauthorized => "Secret key rejected by Aria2".to_string(),
            RpcFailureKind::Unreachable => "Aria2 is not reachable".to_string(),
            RpcFailureKind::Other => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RpcError::protocol(1, "Unauthorized");
        assert_eq!(err.to_string(), "Aria2 error 1: Unauthorized");

        let err = RpcError::Timeout {
            method: "aria2.addUri".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "aria2.addUri timed out after 5000ms");
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            RpcError::protocol(1, "Unauthorized").kind(),
            RpcFailureKind::Unauthorized
        );
        assert_eq!(RpcError::ConnectionClosed.kind(), RpcFailureKind::Unreachable);
        assert_eq!(
            RpcError::HttpStatus {
                status: 401,
                url: "http://x".to_string()
            }
            .kind(),
            RpcFailureKind::Unauthorized
        );
        assert_eq!(
            RpcError::protocol(1, "No URI to download.").kind(),
            RpcFailureKind::Other
        );
        assert_eq!(
            RpcError::InvalidUrl("x".to_string()).kind(),
            RpcFailureKind::Other
        );
    }

    #[test]
    fn test_transport_vs_protocol() {
        assert!(RpcError::ConnectionClosed.is_transport());
        assert!(!RpcError::protocol(1, "boom").is_transport());
        assert!(!RpcError::InvalidResponse("x".to_string()).is_transport());
    }
}
