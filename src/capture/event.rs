use serde::{Deserialize, Serialize};

/// Browser download state as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    #[default]
    InProgress,
    Interrupted,
    Complete,
}

/// "Download determined" event from the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadEvent {
    pub id: u64,
    pub url: String,
    /// URL after redirects (empty when the host does not know it)
    #[serde(default)]
    pub final_url: String,
    /// Suggested filename, possibly a full path
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub referrer: String,
    /// Size in bytes, negative when unknown
    #[serde(default = "unknown_size")]
    pub file_size: i64,
    #[serde(default)]
    pub state: DownloadState,
    #[serde(default)]
    pub error: Option<String>,
    /// Extension that started the download, if any
    #[serde(default)]
    pub by_extension_id: Option<String>,
    #[serde(default)]
    pub incognito: bool,
}

fn unknown_size() -> i64 {
    -1
}

impl DownloadEvent {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            final_url: String::new(),
            filename: String::new(),
            referrer: String::new(),
            file_size: unknown_size(),
            state: DownloadState::InProgress,
            error: None,
            by_extension_id: None,
            incognito: false,
        }
    }

    /// Final URL when known, otherwise the original one
    pub fn effective_url(&self) -> &str {
        if self.final_url.is_empty() {
            &self.url
        } else {
            &self.final_url
        }
    }

    /// Known size in bytes
    pub fn size_bytes(&self) -> Option<u64> {
        u64::try_from(self.file_size).ok()
    }

    /// Filename without directories; falls back to the URL's last segment
    pub fn basename(&self) -> String {
        let from_path = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();
        if !from_path.is_empty() {
            return from_path;
        }
        crate::util::net::filename_from_url(self.effective_url()).unwrap_or_default()
    }

    /// Referrer with the `about:blank` placeholder stripped
    pub fn clean_referrer(&self) -> &str {
        if self.referrer == "about:blank" {
            ""
        } else {
            &self.referrer
        }
    }
}

/// Request to let the browser (or a local fallback) download a URL itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeDownload {
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub referrer: String,
}
