use crate::api::FootageSource;
use crate::config::Config;
use crate::logi;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

const PEXELS_BASE: &str = "https://api.pexels.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { bytes: u64 },
    /// A usable file was already at the destination; no request was made.
    Cached,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Pexels key missing")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search HTTP {0}")]
    Http(u16),
    #[error("no results for '{0}'")]
    NoResults(String),
    #[error("downloaded file too small ({0} bytes)")]
    TooSmall(u64),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    link: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

pub struct PexelsClient {
    client: Client,
    api_key: String,
    base_url: String,
    search_timeout: Duration,
    download_timeout: Duration,
    min_bytes: u64,
}

impl PexelsClient {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.pexels_key.clone(),
            base_url: PEXELS_BASE.to_string(),
            search_timeout: Duration::from_secs(cfg.search_timeout_secs),
            download_timeout: Duration::from_secs(cfg.download_timeout_secs),
            min_bytes: cfg.video.min_clip_bytes,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search_link(&self, keyword: &str) -> Result<String, FetchError> {
        let url = format!("{}/videos/search", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(url)
            .header("Authorization", &self.api_key)
            .query(&[("query", keyword), ("per_page", "1"), ("orientation", "portrait")])
            .timeout(self.search_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FetchError::Http(resp.status().as_u16()));
        }

        let body: SearchResponse = resp.json().await?;
        body.videos
            .into_iter()
            .next()
            .and_then(|v| pick_portrait_file(v.video_files))
            .ok_or_else(|| FetchError::NoResults(keyword.to_string()))
    }
}

#[async_trait]
impl FootageSource for PexelsClient {
    async fn fetch(&self, keyword: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
        if usable_file_size(dest, self.min_bytes).await.is_some() {
            return Ok(FetchOutcome::Cached);
        }
        if self.api_key.is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        let link = self.search_link(keyword).await?;
        logi(format!("Downloading footage for '{}'", keyword));

        let resp = self
            .client
            .get(&link)
            .timeout(self.download_timeout)
            .send()
            .await?
            .error_for_status()?;
        let bytes = resp.bytes().await?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let part = part_path(dest);
        fs::write(&part, &bytes).await?;

        let len = bytes.len() as u64;
        if len <= self.min_bytes {
            let _ = fs::remove_file(&part).await;
            return Err(FetchError::TooSmall(len));
        }
        fs::rename(&part, dest).await?;
        Ok(FetchOutcome::Downloaded { bytes: len })
    }
}

/// First file taller than wide, or the first file at all.
fn pick_portrait_file(files: Vec<VideoFile>) -> Option<String> {
    let portrait = files
        .iter()
        .position(|f| matches!((f.width, f.height), (Some(w), Some(h)) if h >= w));
    let idx = portrait.unwrap_or(0);
    files.into_iter().nth(idx).map(|f| f.link)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Size of `path` when it is a regular file larger than `min_bytes`.
pub async fn usable_file_size(path: &Path, min_bytes: u64) -> Option<u64> {
    let meta = fs::metadata(path).await.ok()?;
    (meta.is_file() && meta.len() > min_bytes).then_some(meta.len())
}
