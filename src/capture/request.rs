use super::event::DownloadEvent;
use crate::rpc::{RpcClient, RpcResult};
use serde_json::{Map, Value, json};
use std::path::PathBuf;

/// Download handed to Aria2
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadRequest {
    pub urls: Vec<String>,
    pub filename: Option<String>,
    pub directory: Option<PathBuf>,
    pub referrer: Option<String>,
    /// Extra `Name: value` header lines
    pub header_lines: Vec<String>,
    /// Raw Aria2 options applied last
    pub option_overrides: Map<String, Value>,
    /// Each URL becomes its own task
    pub is_multi_task: bool,
}

impl DownloadRequest {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Default::default()
        }
    }

    /// Build from a captured browser download
    pub fn from_event(event: &DownloadEvent, user_agent: Option<&str>) -> Self {
        let filename = Some(event.basename()).filter(|n| !n.is_empty());
        let referrer = Some(event.clean_referrer().to_string()).filter(|r| !r.is_empty());

        let mut header_lines = Vec::new();
        if let Some(ua) = user_agent {
            header_lines.push(format!("User-Agent: {}", ua));
        }

        Self {
            urls: vec![event.effective_url().to_string()],
            filename,
            referrer,
            header_lines,
            ..Default::default()
        }
    }

    /// Aria2 options for one `addUri` call
    ///
    /// `out` is omitted for multi-task requests since every task would share it.
    pub fn options(&self) -> Map<String, Value> {
        let mut options = Map::new();

        if !self.is_multi_task {
            if let Some(name) = &self.filename {
                options.insert("out".to_string(), json!(name));
            }
        }
        if let Some(dir) = &self.directory {
            options.insert("dir".to_string(), json!(dir.to_string_lossy()));
        }
        if let Some(referrer) = &self.referrer {
            options.insert("referer".to_string(), json!(referrer));
        }
        if !self.header_lines.is_empty() {
            options.insert("header".to_string(), json!(self.header_lines));
        }
        for (key, value) in &self.option_overrides {
            options.insert(key.clone(), value.clone());
        }
        options
    }

    /// Human-readable label for notifications
    pub fn label(&self) -> String {
        self.filename
            .clone()
            .or_else(|| self.urls.first().cloned())
            .unwrap_or_default()
    }

    /// Send to Aria2; returns the created GIDs in URL order
    pub async fn send(&self, client: &RpcClient) -> RpcResult<Vec<String>> {
        let options = self.options();

        if !self.is_multi_task {
            let gid = client.add_uri(self.urls.clone(), options).await?;
            return Ok(vec![gid]);
        }

        let mut gids = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            gids.push(client.add_uri(vec![url.clone()], options.clone()).await?);
        }
        Ok(gids)
    }
}
