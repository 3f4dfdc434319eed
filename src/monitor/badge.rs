//! Badge and tooltip derived from a snapshot
//!
//! Precedence: active > waiting > idle > error.

use super::snapshot::MonitorSnapshot;
use crate::host::BadgeColor;
use crate::rpc::RpcFailureKind;
use crate::util::format::{format_speed, format_speed_short};

const ACTIVE_COLOR: BadgeColor = [0x1e, 0x88, 0xe5, 0xff];
const WAITING_COLOR: BadgeColor = [0x75, 0x75, 0x75, 0xff];
const IDLE_COLOR: BadgeColor = [0x43, 0xa0, 0x47, 0xff];
const ERROR_COLOR: BadgeColor = [0xe5, 0x39, 0x35, 0xff];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeState {
    /// Active task count and total download speed
    Active { count: u64, speed: u64 },
    Waiting(u64),
    Idle,
    Error,
}

impl BadgeState {
    pub fn from_snapshot(snapshot: &MonitorSnapshot) -> Self {
        if snapshot.active > 0 {
            Self::Active {
                count: snapshot.active,
                speed: snapshot.download_speed,
            }
        } else if snapshot.waiting > 0 {
            Self::Waiting(snapshot.waiting)
        } else if snapshot.connected > 0 {
            Self::Idle
        } else {
            Self::Error
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Active { speed, .. } if *speed > 0 => format_speed_short(*speed),
            Self::Active { count, .. } => count.to_string(),
            Self::Waiting(n) => n.to_string(),
            Self::Idle => String::new(),
            Self::Error => "E".to_string(),
        }
    }

    pub fn color(&self) -> BadgeColor {
        match self {
            Self::Active { .. } => ACTIVE_COLOR,
            Self::Waiting(_) => WAITING_COLOR,
            Self::Idle => IDLE_COLOR,
            Self::Error => ERROR_COLOR,
        }
    }
}

/// Tooltip text
pub fn title(snapshot: &MonitorSnapshot) -> String {
    if snapshot.connected == 0 {
        let reason = match snapshot.primary_error {
            Some(RpcFailureKind::Unauthorized) => "secret key rejected".to_string(),
            Some(RpcFailureKind::Unreachable) | None => "not connected".to_string(),
            Some(RpcFailureKind::Other) => snapshot
                .primary_error_reason
                .clone()
                .unwrap_or_else(|| "error".to_string()),
        };
        return format!("Aria2: {}", reason);
    }

    let total = snapshot.connected + snapshot.disconnected;
    format!(
        "Aria2: {}/{} connected\nActive: {}, Waiting: {}, Stopped: {}\nDownload: {}, Upload: {}",
        snapshot.connected,
        total,
        snapshot.active,
        snapshot.waiting,
        snapshot.stopped,
        format_speed(snapshot.download_speed),
        format_speed(snapshot.upload_speed)
    )
}
