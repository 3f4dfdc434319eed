//! Collaborators owned by the hosting environment
//!
//! The browser (or the local bridge standing in for it) provides downloads,
//! the toolbar icon, the badge, native notifications and power management.
//! Core components only ever talk to these traits.

pub mod headless;
pub mod native;

use crate::capture::event::{DownloadEvent, NativeDownload};
use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle for an attached download listener
pub type SubscriptionId = Uuid;

/// Toolbar icon
#[async_trait]
pub trait IconSink: Send + Sync {
    /// Replace the icon with one rendered frame
    async fn set_icon(&self, frame: &RgbaImage) -> Result<()>;

    /// Put the static default icon back
    async fn restore_default(&self) -> Result<()>;
}

/// Badge color as RGBA
pub type BadgeColor = [u8; 4];

/// Toolbar badge and tooltip
pub trait BadgeSink: Send + Sync {
    fn set_badge(&self, text: &str, color: BadgeColor);
    fn set_title(&self, title: &str);
}

/// Native desktop notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// System sleep inhibition
pub trait PowerManager: Send + Sync {
    /// Request (true) or release (false) the keep-awake lock; idempotent
    fn keep_awake(&self, enabled: bool);
}

/// Browser download API
#[async_trait]
pub trait BrowserDownloads: Send + Sync {
    /// Attach a listener for "download determined" events
    fn subscribe(&self, sink: mpsc::UnboundedSender<DownloadEvent>) -> SubscriptionId;

    /// Detach a listener; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);

    /// Cancel a browser download and clear its error state
    async fn cancel(&self, download_id: u64) -> Result<()>;

    /// Let the browser download a URL itself
    async fn start_native(&self, download: NativeDownload) -> Result<()>;
}

/// Every collaborator, shared by reference across components
#[derive(Clone)]
pub struct HostHandles {
    pub icon: Arc<dyn IconSink>,
    pub badge: Arc<dyn BadgeSink>,
    pub notifier: Arc<dyn Notifier>,
    pub power: Arc<dyn PowerManager>,
    pub downloads: Arc<dyn BrowserDownloads>,
}
