//! Host implementation backed by the local bridge
//!
//! Browser shims connected to the bridge receive [`HostCommand`] lines; the
//! daemon keeps working without one by logging, writing the icon to disk and
//! downloading natively.

use super::native::NativeDownloader;
use super::{
    BadgeColor, BadgeSink, BrowserDownloads, HostHandles, IconSink, Notifier, PowerManager,
    SubscriptionId,
};
use crate::capture::event::{DownloadEvent, NativeDownload};
use crate::ipc::protocol::HostCommand;
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// Last badge/title pushed, for status reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeView {
    pub text: String,
    pub color: BadgeColor,
    pub title: String,
}

pub struct HeadlessHost {
    commands: broadcast::Sender<HostCommand>,
    listeners: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<DownloadEvent>>>,
    icon_output: Option<PathBuf>,
    default_icon: Option<PathBuf>,
    native: Arc<NativeDownloader>,
    badge: Mutex<BadgeView>,
    keep_awake: AtomicBool,
}

impl HeadlessHost {
    pub fn new(
        native: NativeDownloader,
        icon_output: Option<PathBuf>,
        default_icon: Option<PathBuf>,
    ) -> Self {
        let (commands, _) = broadcast::channel(256);
        Self {
            commands,
            listeners: Mutex::new(HashMap::new()),
            icon_output,
            default_icon,
            native: Arc::new(native),
            badge: Mutex::new(BadgeView::default()),
            keep_awake: AtomicBool::new(false),
        }
    }

    /// Every collaborator trait served by this host
    pub fn handles(self: &Arc<Self>) -> HostHandles {
        HostHandles {
            icon: self.clone(),
            badge: self.clone(),
            notifier: self.clone(),
            power: self.clone(),
            downloads: self.clone(),
        }
    }

    /// Stream of commands for one bridge connection
    pub fn commands(&self) -> broadcast::Receiver<HostCommand> {
        self.commands.subscribe()
    }

    /// Number of shims currently listening for commands
    pub fn shim_count(&self) -> usize {
        self.commands.receiver_count()
    }

    /// Deliver a browser event to every attached listener; returns how many got it
    pub fn emit_download(&self, event: DownloadEvent) -> usize {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|_, tx| !tx.is_closed());
        let mut delivered = 0;
        for tx in listeners.values() {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn badge_view(&self) -> BadgeView {
        self.badge.lock().unwrap().clone()
    }

    pub fn is_keeping_awake(&self) -> bool {
        self.keep_awake.load(Ordering::SeqCst)
    }

    fn push(&self, command: HostCommand) -> bool {
        // Err only means no shim is connected
        self.commands.send(command).is_ok()
    }
}

fn encode_png(frame: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    frame.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn color_hex(color: BadgeColor) -> String {
    format!(
        "#{:02x}{:02x}{:02x}{:02x}",
        color[0], color[1], color[2], color[3]
    )
}

#[async_trait]
impl IconSink for HeadlessHost {
    async fn set_icon(&self, frame: &RgbaImage) -> Result<()> {
        if self.icon_output.is_none() && self.shim_count() == 0 {
            return Ok(());
        }

        let png = encode_png(frame)?;
        if let Some(path) = &self.icon_output {
            tokio::fs::write(path, &png).await?;
        }
        if self.shim_count() > 0 {
            self.push(HostCommand::Icon {
                png: BASE64.encode(&png),
            });
        }
        Ok(())
    }

    async fn restore_default(&self) -> Result<()> {
        self.push(HostCommand::ResetIcon);

        if let (Some(output), Some(default)) = (&self.icon_output, &self.default_icon) {
            if let Err(e) = tokio::fs::copy(default, output).await {
                tracing::debug!("Default icon {:?} not restored: {}", default, e);
            }
        }
        Ok(())
    }
}

impl BadgeSink for HeadlessHost {
    fn set_badge(&self, text: &str, color: BadgeColor) {
        {
            let mut view = self.badge.lock().unwrap();
            if view.text == text && view.color == color {
                return;
            }
            view.text = text.to_string();
            view.color = color;
        }
        tracing::debug!("Badge: '{}' {}", text, color_hex(color));
        self.push(HostCommand::Badge {
            text: text.to_string(),
            color: color_hex(color),
        });
    }

    fn set_title(&self, title: &str) {
        {
            let mut view = self.badge.lock().unwrap();
            if view.title == title {
                return;
            }
            view.title = title.to_string();
        }
        self.push(HostCommand::Title {
            title: title.to_string(),
        });
    }
}

#[async_trait]
impl Notifier for HeadlessHost {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        tracing::info!("Notification: {} - {}", title, message);
        self.push(HostCommand::Notify {
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

impl PowerManager for HeadlessHost {
    fn keep_awake(&self, enabled: bool) {
        if self.keep_awake.swap(enabled, Ordering::SeqCst) != enabled {
            tracing::info!("Keep-awake {}", if enabled { "requested" } else { "released" });
            self.push(HostCommand::KeepAwake { enabled });
        }
    }
}

#[async_trait]
impl BrowserDownloads for HeadlessHost {
    fn subscribe(&self, sink: mpsc::UnboundedSender<DownloadEvent>) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.listeners.lock().unwrap().insert(id, sink);
        tracing::debug!("Download listener {} attached", id);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.listeners.lock().unwrap().remove(&id).is_some() {
            tracing::debug!("Download listener {} detached", id);
        }
    }

    async fn cancel(&self, download_id: u64) -> Result<()> {
        if !self.push(HostCommand::Cancel { id: download_id }) {
            tracing::warn!("No browser connected to cancel download {}", download_id);
        }
        Ok(())
    }

    async fn start_native(&self, download: NativeDownload) -> Result<()> {
        if self.shim_count() > 0 {
            self.push(HostCommand::Download {
                url: download.url,
                filename: download.filename,
                referrer: download.referrer,
            });
            return Ok(());
        }

        tracing::info!(
            "No browser connected; downloading {} into {:?}",
            download.url,
            self.native.directory()
        );
        let native = self.native.clone();
        tokio::spawn(async move {
            if let Err(e) = native.download(&download).await {
                tracing::error!("Native download of {} failed: {}", download.url, e);
            }
        });
        Ok(())
    }
}
