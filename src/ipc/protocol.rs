/// Local bridge messages exchanged between the daemon and a browser shim.
///
/// Wire format: each message is a single JSON line terminated by `\n`.
use crate::capture::event::DownloadEvent;
use serde::{Deserialize, Serialize};

/// Bind address; the bridge never listens beyond loopback
pub const BRIDGE_HOST: &str = "127.0.0.1";

/// Request sent from the shim to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeRequest {
    /// The browser determined a new download
    #[serde(rename = "download_determined")]
    DownloadDetermined { event: DownloadEvent },

    /// The focused tab changed
    #[serde(rename = "active_tab")]
    ActiveTab {
        #[serde(default)]
        url: Option<String>,
    },

    /// Start receiving [`HostCommand`] lines on this connection
    #[serde(rename = "subscribe")]
    Subscribe,

    /// Connection health check
    #[serde(rename = "ping")]
    Ping,
}

/// Request plus the shared bridge token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEnvelope {
    #[serde(default)]
    pub token: String,
    #[serde(flatten)]
    pub request: BridgeRequest,
}

/// Reply to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeResponse {
    /// Request accepted
    #[serde(rename = "ok")]
    Ok { message: String },

    /// Accepted but nobody acted on it
    #[serde(rename = "skipped")]
    Skipped { reason: String },

    /// Request was rejected or an error occurred
    #[serde(rename = "error")]
    Error { message: String },

    /// Pong reply to a ping request
    #[serde(rename = "pong")]
    Pong,
}

/// Instruction pushed from the daemon to subscribed shims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Cancel a browser download and erase it from history
    Cancel { id: u64 },

    /// Download a URL with the browser's own downloader
    Download {
        url: String,
        filename: String,
        referrer: String,
    },

    /// New toolbar icon as base64 PNG
    Icon { png: String },

    /// Restore the default toolbar icon
    ResetIcon,

    /// Badge text and `#rrggbbaa` color
    Badge { text: String, color: String },

    /// Toolbar tooltip
    Title { title: String },

    /// Native notification
    Notify { title: String, message: String },

    /// Keep-awake lock state
    KeepAwake { enabled: bool },
}
