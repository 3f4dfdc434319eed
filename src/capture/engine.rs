use super::decision::{CaptureRuleSet, Decision, SkipReason, should_capture};
use super::event::{DownloadEvent, NativeDownload};
use super::request::DownloadRequest;
use crate::app::config::Config;
use crate::host::{BrowserDownloads, SubscriptionId};
use crate::notify::{AriaEvent, Notice, NotificationDispatcher};
use crate::rpc::ClientPool;
use crate::rpc::resolve::resolve_server;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No RPC server configured")]
    NoServer,

    #[error("Native download fallback failed: {0}")]
    Fallback(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Disabled,
    Enabled,
}

/// What happened to one browser download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Skipped(SkipReason),
    Sent { server: String, gids: Vec<String> },
    /// Local daemon failed; the browser downloads it instead
    FellBack { server: String, error: String },
    /// Remote daemon failed; the user was notified
    Failed { server: String, error: String },
}

struct Listener {
    state: CaptureState,
    /// Bumped on every enable/disable so stale listener tasks stop
    generation: u64,
    subscription: Option<SubscriptionId>,
}

/// Intercepts browser downloads and reroutes them to Aria2
pub struct CaptureEngine {
    config: Arc<RwLock<Config>>,
    downloads: Arc<dyn BrowserDownloads>,
    clients: Arc<ClientPool>,
    dispatcher: Arc<NotificationDispatcher>,
    listener: Mutex<Listener>,
    active_tab: Mutex<Option<String>>,
    cooldown_until: Mutex<Option<Instant>>,
}

impl CaptureEngine {
    pub fn new(
        config: Arc<RwLock<Config>>,
        downloads: Arc<dyn BrowserDownloads>,
        clients: Arc<ClientPool>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            downloads,
            clients,
            dispatcher,
            listener: Mutex::new(Listener {
                state: CaptureState::Disabled,
                generation: 0,
                subscription: None,
            }),
            active_tab: Mutex::new(None),
            cooldown_until: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.listener.lock().unwrap().state
    }

    /// Attach the download listener; no-op when already enabled
    pub fn enable(self: &Arc<Self>) {
        let mut listener = self.listener.lock().unwrap();
        if listener.state == CaptureState::Enabled {
            return;
        }
        listener.generation += 1;
        let generation = listener.generation;

        let (tx, mut rx) = mpsc::unbounded_channel::<DownloadEvent>();
        listener.subscription = Some(self.downloads.subscribe(tx));
        listener.state = CaptureState::Enabled;
        drop(listener);

        let engine = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if !engine.is_current(generation) {
                    break;
                }
                let id = event.id;
                match engine.handle_event(event, generation).await {
                    Ok(outcome) => tracing::debug!("Download {}: {:?}", id, outcome),
                    Err(e) => tracing::warn!("Download {} not captured: {}", id, e),
                }
            }
            tracing::debug!("Capture listener #{} finished", generation);
        });
        tracing::info!("Download capture enabled");
    }

    /// Detach the download listener; no-op when already disabled
    pub fn disable(&self) {
        let mut listener = self.listener.lock().unwrap();
        if listener.state == CaptureState::Disabled {
            return;
        }
        listener.generation += 1;
        if let Some(id) = listener.subscription.take() {
            self.downloads.unsubscribe(id);
        }
        listener.state = CaptureState::Disabled;
        tracing::info!("Download capture disabled");
    }

    pub fn set_enabled(self: &Arc<Self>, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }

    /// Follow the `capture.enabled` flag
    pub async fn sync_with_config(self: &Arc<Self>) {
        let enabled = self.config.read().await.capture.enabled;
        self.set_enabled(enabled);
    }

    pub fn set_active_tab(&self, url: Option<String>) {
        *self.active_tab.lock().unwrap() = url;
    }

    pub fn active_tab(&self) -> Option<String> {
        self.active_tab.lock().unwrap().clone()
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_until
            .lock()
            .unwrap()
            .is_some_and(|until| Instant::now() < until)
    }

    /// Handle one event directly, as the listener would
    pub async fn process(self: &Arc<Self>, event: DownloadEvent) -> Result<CaptureOutcome, CaptureError> {
        let generation = {
            let listener = self.listener.lock().unwrap();
            if listener.state == CaptureState::Disabled {
                return Ok(CaptureOutcome::Skipped(SkipReason::CaptureDisabled));
            }
            listener.generation
        };
        self.handle_event(event, generation).await
    }

    fn is_current(&self, generation: u64) -> bool {
        let listener = self.listener.lock().unwrap();
        listener.state == CaptureState::Enabled && listener.generation == generation
    }

    async fn handle_event(
        self: &Arc<Self>,
        event: DownloadEvent,
        generation: u64,
    ) -> Result<CaptureOutcome, CaptureError> {
        if !self.is_current(generation) {
            return Ok(CaptureOutcome::Skipped(SkipReason::CaptureDisabled));
        }
        if self.is_cooling_down() {
            return Ok(CaptureOutcome::Skipped(SkipReason::CoolingDown));
        }

        let (rules, servers, user_agent, cooldown) = {
            let config = self.config.read().await;
            (
                CaptureRuleSet::from_config(&config.capture, &config.general.self_extension_id),
                config.rpc.clone(),
                config.general.user_agent.clone(),
                Duration::from_secs(config.capture.fallback_cooldown_secs),
            )
        };

        let tab = self.active_tab();
        let reason = match should_capture(&event, &rules, tab.as_deref()) {
            Decision::Capture(reason) => reason,
            Decision::Skip(reason) => {
                tracing::debug!("Leaving {} to the browser: {}", event.effective_url(), reason);
                return Ok(CaptureOutcome::Skipped(reason));
            }
        };
        tracing::info!("Capturing {} ({:?})", event.effective_url(), reason);

        // No server means the browser keeps its download
        let server = resolve_server(&servers, event.effective_url())
            .cloned()
            .ok_or(CaptureError::NoServer)?;

        if let Err(e) = self.downloads.cancel(event.id).await {
            tracing::warn!("Failed to cancel browser download {}: {}", event.id, e);
        }
        let mut request = DownloadRequest::from_event(&event, user_agent.as_deref());
        request.directory = server.download_directory();
        let label = request.label();

        let sent = match self.clients.client_for(&server).await {
            Ok(client) => request.send(&client).await,
            Err(e) => Err(e),
        };

        match sent {
            Ok(gids) => {
                tracing::info!("Sent {} to {} as {:?}", label, server.name, gids);
                let mut notice = Notice::new(AriaEvent::ExportSuccess, &server.name).with_context(&label);
                notice.gid = gids.first().cloned();
                self.dispatcher.dispatch(notice, None).await;
                Ok(CaptureOutcome::Sent {
                    server: server.name,
                    gids,
                })
            }
            Err(e) if server.is_local() => {
                tracing::warn!(
                    "Local Aria2 '{}' failed ({}); handing {} back to the browser",
                    server.name,
                    e,
                    label
                );
                self.fall_back_to_browser(&event, cooldown).await?;
                Ok(CaptureOutcome::FellBack {
                    server: server.name,
                    error: e.to_string(),
                })
            }
            Err(e) => {
                tracing::error!("Failed to send {} to '{}': {}", label, server.name, e);
                let notice = Notice::new(AriaEvent::ExportError, &server.name)
                    .with_context(format!("{}: {}", label, e.reason()));
                self.dispatcher.dispatch(notice, None).await;
                Ok(CaptureOutcome::Failed {
                    server: server.name,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Replay natively with capture detached so the download is not caught again
    async fn fall_back_to_browser(
        self: &Arc<Self>,
        event: &DownloadEvent,
        cooldown: Duration,
    ) -> Result<(), CaptureError> {
        if !cooldown.is_zero() {
            *self.cooldown_until.lock().unwrap() = Some(Instant::now() + cooldown);
        }

        let was_enabled = self.state() == CaptureState::Enabled;
        self.disable();
        let result = self
            .downloads
            .start_native(NativeDownload {
                url: event.effective_url().to_string(),
                filename: event.basename(),
                referrer: event.clean_referrer().to_string(),
            })
            .await;
        if was_enabled {
            self.enable();
        }

        result.map_err(|e| CaptureError::Fallback(e.to_string()))
    }
}
