//! Local downloader used when no browser shim can take a download back

use crate::capture::event::NativeDownload;
use crate::util::net::filename_from_url;
use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue, REFERER};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

const FALLBACK_FILENAME: &str = "download";

/// Streams a URL straight to disk
pub struct NativeDownloader {
    client: reqwest::Client,
    directory: PathBuf,
}

impl NativeDownloader {
    pub fn new(directory: PathBuf, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 min total timeout
            .connect_timeout(std::time::Duration::from_secs(30));
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }

        Ok(Self {
            client: builder.build()?,
            directory,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Download to the target directory; returns the written path
    pub async fn download(&self, request: &NativeDownload) -> Result<PathBuf> {
        let mut headers = HeaderMap::new();
        if !request.referrer.is_empty() {
            headers.insert(REFERER, HeaderValue::from_str(&request.referrer)?);
        }

        tracing::debug!("Native download: {}", request.url);
        let response = self
            .client
            .get(&request.url)
            .headers(headers)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP {} for {}",
                response.status().as_u16(),
                request.url
            ));
        }

        let name = pick_filename(request, response.headers());
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = unique_path(&self.directory, &name).await;

        match write_body(response, &path).await {
            Ok(written) => {
                tracing::info!("Native download finished: {:?} ({} bytes)", path, written);
                Ok(path)
            }
            Err(e) => {
                tracing::warn!("Native download of {} failed: {}", request.url, e);
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::debug!("Failed to remove partial file {:?}: {}", path, remove_err);
                }
                Err(e)
            }
        }
    }
}

/// Stream the body to `path`; returns the number of bytes written
async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    // 64KB buffer reduces syscall overhead for fast links
    let file = File::create(path).await?;
    let mut file = BufWriter::with_capacity(64 * 1024, file);

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Requested name > Content-Disposition > URL > fixed fallback
fn pick_filename(request: &NativeDownload, headers: &HeaderMap) -> String {
    let requested = request
        .filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let disposition = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.split("filename=")
                .nth(1)
                .map(|s| s.split(';').next().unwrap_or(s).trim_matches('"').to_string())
        })
        .filter(|n| !n.is_empty());

    requested
        .or(disposition)
        .or_else(|| filename_from_url(&request.url))
        .map(|n| sanitize(&n))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches(['.', ' '])
        .to_string()
}

/// `name`, or `stem (n).ext` when taken
async fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, format!(".{}", e)),
        _ => (name, String::new()),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, n, ext));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}
