//! Rule evaluation for a single browser download
//!
//! Precedence, first match wins:
//! allowed host > blocked host > allowed extension > blocked extension > size.

use super::event::{DownloadEvent, DownloadState};
use crate::app::config::CaptureConfig;
use crate::util::net::hostname;
use crate::util::pattern::matches;

const CAPTURABLE_SCHEMES: &[&str] = &["http", "https", "ftp", "sftp"];
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Capture rules, read-only while a decision is made
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureRuleSet {
    pub allowed_hosts: Vec<String>,
    pub blocked_hosts: Vec<String>,
    pub allowed_exts: Vec<String>,
    pub blocked_exts: Vec<String>,
    pub min_file_size_bytes: u64,
    pub allowed_extension_ids: Vec<String>,
    pub blocked_extension_ids: Vec<String>,
    /// Downloads started by this id are never captured
    pub own_extension_id: String,
}

fn normalized(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl CaptureRuleSet {
    pub fn from_config(config: &CaptureConfig, own_extension_id: &str) -> Self {
        Self {
            allowed_hosts: normalized(&config.allowed_sites),
            blocked_hosts: normalized(&config.blocked_sites),
            allowed_exts: normalized(&config.allowed_exts),
            blocked_exts: normalized(&config.blocked_exts),
            min_file_size_bytes: config.min_file_size_mb.saturating_mul(BYTES_PER_MB),
            allowed_extension_ids: config.allowed_extension_ids.clone(),
            blocked_extension_ids: config.blocked_extension_ids.clone(),
            own_extension_id: own_extension_id.to_string(),
        }
    }
}

/// Why a download is captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureReason {
    AllowedHost(String),
    AllowedExtension(String),
    SizeThreshold,
}

/// Why a download is left to the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotInProgress,
    UnsupportedScheme,
    Errored,
    OwnDownload,
    BlockedExtensionId(String),
    BlockedHost(String),
    BlockedExtension(String),
    BelowSizeThreshold,
    CaptureDisabled,
    CoolingDown,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInProgress => write!(f, "download is not in progress"),
            Self::UnsupportedScheme => write!(f, "unsupported URL scheme"),
            Self::Errored => write!(f, "download already errored"),
            Self::OwnDownload => write!(f, "started by this extension"),
            Self::BlockedExtensionId(id) => write!(f, "started by blocked extension {}", id),
            Self::BlockedHost(p) => write!(f, "host matches blocked pattern {}", p),
            Self::BlockedExtension(e) => write!(f, "filename matches blocked extension {}", e),
            Self::BelowSizeThreshold => write!(f, "smaller than the size threshold"),
            Self::CaptureDisabled => write!(f, "capture is disabled"),
            Self::CoolingDown => write!(f, "local daemon recently failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Capture(CaptureReason),
    Skip(SkipReason),
}

impl Decision {
    pub fn is_capture(&self) -> bool {
        matches!(self, Self::Capture(_))
    }
}

fn url_scheme(url: &str) -> Option<String> {
    url::Url::parse(url).ok().map(|u| u.scheme().to_lowercase())
}

fn ends_with_ext(filename: &str, ext: &str) -> bool {
    ext == "*" || filename.ends_with(ext)
}

/// Decide whether a download should be rerouted to Aria2
pub fn should_capture(
    event: &DownloadEvent,
    rules: &CaptureRuleSet,
    active_tab_url: Option<&str>,
) -> Decision {
    // 1. Only genuine, healthy, foreign downloads
    if event.state != DownloadState::InProgress {
        return Decision::Skip(SkipReason::NotInProgress);
    }
    let scheme_ok = url_scheme(event.effective_url())
        .is_some_and(|s| CAPTURABLE_SCHEMES.contains(&s.as_str()));
    if !scheme_ok {
        return Decision::Skip(SkipReason::UnsupportedScheme);
    }
    if event.error.as_deref().is_some_and(|e| !e.is_empty()) {
        return Decision::Skip(SkipReason::Errored);
    }
    if let Some(ext_id) = event.by_extension_id.as_deref() {
        if ext_id == rules.own_extension_id {
            return Decision::Skip(SkipReason::OwnDownload);
        }

        // 2. Other extensions
        let blocked = rules
            .blocked_extension_ids
            .iter()
            .any(|b| b == "*" || b == ext_id);
        let allowed = rules.allowed_extension_ids.iter().any(|a| a == ext_id);
        if blocked && !allowed {
            return Decision::Skip(SkipReason::BlockedExtensionId(ext_id.to_string()));
        }
    }

    let hosts: Vec<String> = [
        active_tab_url,
        Some(event.clean_referrer()).filter(|r| !r.is_empty()),
        Some(event.effective_url()),
    ]
    .into_iter()
    .flatten()
    .filter_map(hostname)
    .collect();

    // 3. Allowed hosts short-circuit everything else
    for pattern in &rules.allowed_hosts {
        if hosts.iter().any(|h| matches(h, pattern)) {
            return Decision::Capture(CaptureReason::AllowedHost(pattern.clone()));
        }
    }

    // 4. Blocked hosts
    for pattern in &rules.blocked_hosts {
        if hosts.iter().any(|h| matches(h, pattern)) {
            return Decision::Skip(SkipReason::BlockedHost(pattern.clone()));
        }
    }

    let filename = event.basename().to_lowercase();

    // 5. Allowed extensions
    for ext in &rules.allowed_exts {
        if ends_with_ext(&filename, ext) {
            return Decision::Capture(CaptureReason::AllowedExtension(ext.clone()));
        }
    }

    // 6. Blocked extensions
    for ext in &rules.blocked_exts {
        if ends_with_ext(&filename, ext) {
            return Decision::Skip(SkipReason::BlockedExtension(ext.clone()));
        }
    }

    // 7. Size threshold; unknown size counts as zero bytes
    if event.size_bytes().unwrap_or(0) >= rules.min_file_size_bytes {
        Decision::Capture(CaptureReason::SizeThreshold)
    } else {
        Decision::Skip(SkipReason::BelowSizeThreshold)
    }
}
