use crate::animation::AnimationKind;

/// Aria2 lifecycle events plus the local export results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AriaEvent {
    DownloadStart,
    DownloadPause,
    DownloadStop,
    DownloadComplete,
    BtDownloadComplete,
    DownloadError,
    /// Download handed to Aria2
    ExportSuccess,
    /// Handing the download to Aria2 failed
    ExportError,
    /// Torrent finished downloading and keeps seeding
    SeedingComplete,
}

impl AriaEvent {
    /// Parse an event name, with or without the `aria2.` prefix
    pub fn from_name(s: &str) -> Option<Self> {
        match s.strip_prefix("aria2.").unwrap_or(s) {
            "onDownloadStart" => Some(Self::DownloadStart),
            "onDownloadPause" => Some(Self::DownloadPause),
            "onDownloadStop" => Some(Self::DownloadStop),
            "onDownloadComplete" => Some(Self::DownloadComplete),
            "onBtDownloadComplete" => Some(Self::BtDownloadComplete),
            "onDownloadError" => Some(Self::DownloadError),
            "onExportSuccess" => Some(Self::ExportSuccess),
            "onExportError" => Some(Self::ExportError),
            "onSeedingComplete" => Some(Self::SeedingComplete),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DownloadStart => "onDownloadStart",
            Self::DownloadPause => "onDownloadPause",
            Self::DownloadStop => "onDownloadStop",
            Self::DownloadComplete => "onDownloadComplete",
            Self::BtDownloadComplete => "onBtDownloadComplete",
            Self::DownloadError => "onDownloadError",
            Self::ExportSuccess => "onExportSuccess",
            Self::ExportError => "onExportError",
            Self::SeedingComplete => "onSeedingComplete",
        }
    }

    /// Icon animation, chosen by the event name's suffix
    pub fn animation(&self) -> Option<AnimationKind> {
        let name = self.name();
        if name.ends_with("Complete") {
            Some(AnimationKind::Complete)
        } else if name.ends_with("Error") {
            Some(AnimationKind::Error)
        } else if name.ends_with("Success") || name.ends_with("Start") {
            Some(AnimationKind::Download)
        } else if name.ends_with("Pause") {
            Some(AnimationKind::Pause)
        } else {
            None
        }
    }

    /// Notification title; `None` for events that never notify
    pub fn title(&self) -> Option<&'static str> {
        match self {
            Self::DownloadStart | Self::DownloadPause | Self::DownloadStop => None,
            Self::DownloadComplete => Some("Download complete"),
            Self::BtDownloadComplete => Some("BitTorrent download complete"),
            Self::DownloadError => Some("Download failed"),
            Self::ExportSuccess => Some("Sent to Aria2"),
            Self::ExportError => Some("Could not send to Aria2"),
            Self::SeedingComplete => Some("Download complete, now seeding"),
        }
    }
}

impl std::fmt::Display for AriaEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
