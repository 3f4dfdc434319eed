//! Aria2 JSON-RPC 2.0 wire types
//!
//! Requests are `{jsonrpc:"2.0", method, id, params}` with integer ids.
//! Aria2 encodes most numbers as decimal strings, so the typed results below
//! accept either form.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const ADD_URI: &str = "aria2.addUri";
pub const GET_GLOBAL_STAT: &str = "aria2.getGlobalStat";
pub const TELL_STATUS: &str = "aria2.tellStatus";
pub const TELL_ACTIVE: &str = "aria2.tellActive";
pub const CHANGE_GLOBAL_OPTION: &str = "aria2.changeGlobalOption";
pub const GET_VERSION: &str = "aria2.getVersion";

/// Outgoing request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: u64,
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Build a request, prepending `token:<secret>` when a secret is set
    pub fn new(id: u64, method: &str, mut params: Vec<Value>, secret: &str) -> Self {
        if !secret.is_empty() {
            params.insert(0, Value::String(format!("token:{}", secret)));
        }
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            id,
            params,
        }
    }

    /// Serialized form with the secret masked, for logs
    pub fn redacted(&self) -> String {
        let mut copy = self.clone();
        if let Some(Value::String(first)) = copy.params.first_mut() {
            if first.starts_with("token:") {
                *first = "token:***".to_string();
            }
        }
        serde_json::to_string(&copy).unwrap_or_default()
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Any message received from Aria2: a response (has `id`) or a notification
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

impl IncomingMessage {
    /// Numeric correlation id; Aria2 echoes it back as sent
    pub fn numeric_id(&self) -> Option<u64> {
        match self.id.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Interpret as a server-initiated notification
    pub fn as_notification(&self) -> Option<RpcNotification> {
        if self.id.is_some() {
            return None;
        }
        let method = self.method.clone()?;
        let gid = self
            .params
            .as_ref()
            .and_then(|p| p.first())
            .and_then(|event| event.get("gid"))
            .and_then(|g| g.as_str())
            .map(str::to_string);
        Some(RpcNotification { method, gid })
    }
}

/// Server push such as `aria2.onDownloadComplete`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcNotification {
    pub method: String,
    pub gid: Option<String>,
}

fn de_u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

/// Result of `aria2.getGlobalStat`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStat {
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub download_speed: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub upload_speed: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub num_active: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub num_waiting: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub num_stopped: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub num_stopped_total: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TaskUri {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFile {
    #[serde(default)]
    pub path: String,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub length: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub completed_length: u64,
    #[serde(default)]
    pub uris: Vec<TaskUri>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BitTorrentInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BitTorrent {
    #[serde(default)]
    pub info: Option<BitTorrentInfo>,
}

/// Result of `aria2.tellStatus` / entries of `aria2.tellActive`
///
/// Only the keys that were requested are present; everything defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    #[serde(default)]
    pub gid: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub dir: String,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub total_length: u64,
    #[serde(default, deserialize_with = "de_u64_lenient")]
    pub completed_length: u64,
    #[serde(default)]
    pub files: Vec<TaskFile>,
    #[serde(default)]
    pub bittorrent: Option<BitTorrent>,
}

impl TaskStatus {
    pub fn torrent_name(&self) -> Option<&str> {
        self.bittorrent
            .as_ref()
            .and_then(|bt| bt.info.as_ref())
            .and_then(|info| info.name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_prepends_token() {
        let req = RpcRequest::new(7, ADD_URI, vec![json!(["http://a/b"])], "secret");
        let wire = serde_json::to_value(&req).unwrap();

        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["method"], "aria2.addUri");
        assert_eq!(wire["id"], 7);
        assert_eq!(wire["params"][0], "token:secret");
        assert_eq!(wire["params"][1][0], "http://a/b");
    }

    #[test]
    fn test_request_without_secret_has_no_token() {
        let req = RpcRequest::new(1, GET_GLOBAL_STAT, vec![], "");
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_redacted_masks_secret() {
        let req = RpcRequest::new(1, GET_GLOBAL_STAT, vec![], "hunter2");
        let logged = req.redacted();
        assert!(!logged.contains("hunter2"));
        assert!(logged.contains("token:***"));
    }

    #[test]
    fn test_incoming_response_and_notification() {
        let resp: IncomingMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":"OK"}"#).unwrap();
        assert_eq!(resp.numeric_id(), Some(3));
        assert!(resp.as_notification().is_none());

        let note: IncomingMessage = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"aria2.onDownloadComplete","params":[{"gid":"abc"}]}"#,
        )
        .unwrap();
        assert_eq!(note.numeric_id(), None);
        assert_eq!(
            note.as_notification(),
            Some(RpcNotification {
                method: "aria2.onDownloadComplete".to_string(),
                gid: Some("abc".to_string()),
            })
        );
    }

    #[test]
    fn test_global_stat_accepts_strings() {
        let stat: GlobalStat = serde_json::from_value(json!({
            "downloadSpeed": "2048",
            "uploadSpeed": 10,
            "numActive": "2",
            "numWaiting": "1",
            "numStopped": "5",
            "numStoppedTotal": "9"
        }))
        .unwrap();

        assert_eq!(stat.download_speed, 2048);
        assert_eq!(stat.upload_speed, 10);
        assert_eq!(stat.num_active, 2);
        assert_eq!(stat.num_stopped_total, 9);
    }

    #[test]
    fn test_task_status_torrent_name() {
        let status: TaskStatus = serde_json::from_value(json!({
            "dir": "/dl",
            "files": [{"path": "/dl/a.mkv", "uris": []}],
            "bittorrent": {"info": {"name": "MyShow"}}
        }))
        .unwrap();
        assert_eq!(status.torrent_name(), Some("MyShow"));

        let plain: TaskStatus = serde_json::from_value(json!({"files": []})).unwrap();
        assert_eq!(plain.torrent_name(), None);
    }
}
