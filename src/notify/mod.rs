//! Maps Aria2 lifecycle events to icon animations and native notifications

pub mod events;

pub use events::AriaEvent;

use crate::animation::AnimationEngine;
use crate::app::config::Config;
use crate::host::Notifier;
use crate::rpc::RpcClient;
use crate::rpc::message::{RpcNotification, TaskStatus};
use crate::util::net::filename_from_url;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Marker Aria2 puts in front of magnet metadata downloads
const METADATA_MARKER: &str = "[METADATA]";
const TASK_CONTEXT_KEYS: &[&str] = &["dir", "files", "bittorrent"];

/// One event to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub event: AriaEvent,
    /// Server the event came from
    pub server: String,
    pub gid: Option<String>,
    /// Pre-resolved message; fetched from the task when absent
    pub context: Option<String>,
}

impl Notice {
    pub fn new(event: AriaEvent, server: impl Into<String>) -> Self {
        Self {
            event,
            server: server.into(),
            gid: None,
            context: None,
        }
    }

    pub fn with_gid(mut self, gid: impl Into<String>) -> Self {
        self.gid = Some(gid.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Result of a dispatch, after any reclassification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub event: AriaEvent,
    pub message: Option<String>,
    pub notified: bool,
}

pub struct NotificationDispatcher {
    animation: Arc<AnimationEngine>,
    notifier: Arc<dyn Notifier>,
    config: Arc<RwLock<Config>>,
}

impl NotificationDispatcher {
    pub fn new(
        animation: Arc<AnimationEngine>,
        notifier: Arc<dyn Notifier>,
        config: Arc<RwLock<Config>>,
    ) -> Self {
        Self {
            animation,
            notifier,
            config,
        }
    }

    /// Animate, resolve context, reclassify and notify
    ///
    /// `client` is used to look the task up when the notice carries a GID.
    pub async fn dispatch(&self, notice: Notice, client: Option<&RpcClient>) -> Dispatched {
        if let Some(kind) = notice.event.animation() {
            if let Err(e) = self.animation.start(kind, None) {
                tracing::debug!("No animation for {}: {}", notice.event, e);
            }
        }

        let enabled = self.config.read().await.notification.enabled;
        if !enabled || notice.event.title().is_none() {
            return Dispatched {
                event: notice.event,
                message: notice.context,
                notified: false,
            };
        }

        let mut event = notice.event;
        let needs_status = notice.context.is_none() || event == AriaEvent::DownloadComplete;
        let status = match (notice.gid.as_deref(), client) {
            (Some(gid), Some(client)) if needs_status => {
                match client.tell_status(gid, TASK_CONTEXT_KEYS).await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        tracing::debug!("tellStatus {} on {} failed: {}", gid, notice.server, e);
                        None
                    }
                }
            }
            _ => None,
        };

        let message = notice
            .context
            .or_else(|| status.as_ref().and_then(describe_task))
            .or(notice.gid);

        let is_torrent = status.as_ref().is_some_and(|s| s.bittorrent.is_some());
        if event == AriaEvent::DownloadComplete
            && is_torrent
            && !message.as_deref().is_some_and(is_metadata_only)
        {
            event = AriaEvent::SeedingComplete;
        }

        let title = event.title().unwrap_or_default();
        let body = message.clone().unwrap_or_else(|| notice.server.clone());
        let notified = match self.notifier.notify(title, &body).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to show notification '{}': {}", title, e);
                false
            }
        };

        Dispatched {
            event,
            message,
            notified,
        }
    }

    /// Dispatch a socket notification; unknown methods are ignored
    pub async fn handle_rpc_notification(
        &self,
        note: &RpcNotification,
        client: &RpcClient,
    ) -> Option<Dispatched> {
        let Some(event) = AriaEvent::from_name(&note.method) else {
            tracing::debug!("Ignoring unknown Aria2 event {}", note.method);
            return None;
        };

        let mut notice = Notice::new(event, client.name());
        notice.gid = note.gid.clone();
        Some(self.dispatch(notice, Some(client)).await)
    }

    /// Forward every notification `client` receives until it is dropped
    pub fn listen(self: &Arc<Self>, client: Arc<RpcClient>) -> JoinHandle<()> {
        let dispatcher = Arc::downgrade(self);
        let mut notes = client.subscribe();
        tokio::spawn(async move {
            loop {
                let note = match notes.recv().await {
                    Ok(note) => note,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Dropped {} Aria2 notifications", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(dispatcher) = dispatcher.upgrade() else {
                    break;
                };
                dispatcher.handle_rpc_notification(&note, &client).await;
            }
        })
    }
}

/// Torrent name > first file path > filename of the first URI
pub fn describe_task(status: &TaskStatus) -> Option<String> {
    if let Some(name) = status.torrent_name() {
        return Some(name.to_string());
    }
    let first = status.files.first()?;
    if !first.path.is_empty() {
        return Some(first.path.clone());
    }
    first
        .uris
        .first()
        .and_then(|u| filename_from_url(&u.uri))
}

fn is_metadata_only(message: &str) -> bool {
    message.starts_with(METADATA_MARKER) || message.to_lowercase().ends_with(".torrent")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationKind;
    use crate::animation::engine::tests::RecordingIcon;
    use crate::rpc::RpcEndpoint;
    use anyhow::Result;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, title: &str, message: &str) -> Result<()> {
            self.shown
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn dispatcher(enabled: bool) -> (NotificationDispatcher, Arc<RecordingNotifier>, Arc<AnimationEngine>) {
        let mut config = Config::default_with_servers();
        config.notification.enabled = enabled;
        let animation = Arc::new(AnimationEngine::new(
            Arc::new(RecordingIcon::default()),
            Default::default(),
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(
            animation.clone(),
            notifier.clone(),
            Arc::new(RwLock::new(config)),
        );
        (dispatcher, notifier, animation)
    }

    async fn aria2_with_status(status: serde_json::Value) -> (MockServer, RpcClient) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "aria2.tellStatus"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": status
            })))
            .mount(&server)
            .await;
        let client = RpcClient::new(RpcEndpoint::new(
            "Aria2",
            format!("{}/jsonrpc", server.uri()),
            "",
        ))
        .unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_torrent_completion_becomes_seeding() {
        let (dispatcher, notifier, animation) = dispatcher(true);
        let (_server, client) = aria2_with_status(json!({
            "dir": "/downloads",
            "files": [{"path": "/downloads/MyShow.S01E01.mkv", "uris": []}],
            "bittorrent": {}
        }))
        .await;

        let result = dispatcher
            .dispatch(
                Notice::new(AriaEvent::DownloadComplete, "Aria2").with_gid("g1"),
                Some(&client),
            )
            .await;

        assert_eq!(result.event, AriaEvent::SeedingComplete);
        assert_eq!(result.message.as_deref(), Some("/downloads/MyShow.S01E01.mkv"));
        assert_eq!(
            notifier.shown.lock().unwrap().as_slice(),
            &[(
                "Download complete, now seeding".to_string(),
                "/downloads/MyShow.S01E01.mkv".to_string()
            )]
        );
        assert_eq!(animation.current_kind(), Some(AnimationKind::Complete));
    }

    #[tokio::test]
    async fn test_metadata_download_stays_complete() {
        let (dispatcher, _notifier, _animation) = dispatcher(true);
        let (_server, client) = aria2_with_status(json!({
            "files": [{"path": "[METADATA]magnet-info", "uris": []}],
            "bittorrent": {}
        }))
        .await;

        let result = dispatcher
            .dispatch(
                Notice::new(AriaEvent::DownloadComplete, "Aria2").with_gid("g2"),
                Some(&client),
            )
            .await;

        assert_eq!(result.event, AriaEvent::DownloadComplete);
        assert_eq!(result.message.as_deref(), Some("[METADATA]magnet-info"));
    }

    #[tokio::test]
    async fn test_torrent_descriptor_stays_complete() {
        let (dispatcher, _notifier, _animation) = dispatcher(true);
        let (_server, client) = aria2_with_status(json!({
            "files": [{"path": "/downloads/ubuntu.iso.torrent", "uris": []}],
            "bittorrent": {}
        }))
        .await;

        let result = dispatcher
            .dispatch(
                Notice::new(AriaEvent::DownloadComplete, "Aria2").with_gid("g3"),
                Some(&client),
            )
            .await;
        assert_eq!(result.event, AriaEvent::DownloadComplete);
    }

    #[tokio::test]
    async fn test_context_prefers_torrent_name_then_uri() {
        let named: TaskStatus = serde_json::from_value(json!({
            "files": [{"path": "/d/a.mkv"}],
            "bittorrent": {"info": {"name": "Show Pack"}}
        }))
        .unwrap();
        assert_eq!(describe_task(&named).as_deref(), Some("Show Pack"));

        let pending: TaskStatus = serde_json::from_value(json!({
            "files": [{"path": "", "uris": [{"uri": "http://h/dir/file%20one.zip", "status": "used"}]}]
        }))
        .unwrap();
        assert_eq!(describe_task(&pending).as_deref(), Some("file one.zip"));

        let empty: TaskStatus = serde_json::from_value(json!({"files": []})).unwrap();
        assert_eq!(describe_task(&empty), None);
    }

    #[tokio::test]
    async fn test_preference_gates_notification_not_animation() {
        let (dispatcher, notifier, animation) = dispatcher(false);

        let result = dispatcher
            .dispatch(
                Notice::new(AriaEvent::ExportError, "Aria2").with_context("file.iso"),
                None,
            )
            .await;

        assert!(!result.notified);
        assert!(notifier.shown.lock().unwrap().is_empty());
        assert_eq!(animation.current_kind(), Some(AnimationKind::Error));
    }

    #[tokio::test]
    async fn test_supplied_context_skips_lookup() {
        let (dispatcher, notifier, _animation) = dispatcher(true);

        let result = dispatcher
            .dispatch(
                Notice::new(AriaEvent::ExportSuccess, "NAS").with_context("file.iso"),
                None,
            )
            .await;

        assert!(result.notified);
        assert_eq!(
            notifier.shown.lock().unwrap()[0],
            ("Sent to Aria2".to_string(), "file.iso".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_rpc_notification_is_noop() {
        let (dispatcher, notifier, animation) = dispatcher(true);
        let client =
            RpcClient::new(RpcEndpoint::new("Aria2", "http://localhost:6800/jsonrpc", "")).unwrap();

        let note = RpcNotification {
            method: "aria2.onSomethingElse".to_string(),
            gid: Some("g".to_string()),
        };
        assert!(dispatcher.handle_rpc_notification(&note, &client).await.is_none());
        assert!(notifier.shown.lock().unwrap().is_empty());
        assert_eq!(animation.current_kind(), None);
    }

    #[test]
    fn test_metadata_detection() {
        assert!(is_metadata_only("[METADATA]abc"));
        assert!(is_metadata_only("/d/file.TORRENT"));
        assert!(!is_metadata_only("/d/show.mkv"));
    }
}
