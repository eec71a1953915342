use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::audio::{MediaItem, PlaybackError};

const YOUTUBE_HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "music.youtube.com"];

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Could not run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Timed out looking up the video")]
    Timeout,

    #[error("Could not load the video: {0}")]
    Failed(String),

    #[error("Unexpected yt-dlp output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No results found!")]
    NoResults,
}

impl From<ResolveError> for PlaybackError {
    fn from(e: ResolveError) -> Self {
        PlaybackError::Resolution(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpOutput {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    #[serde(default)]
    entries: Vec<YtDlpOutput>,
}

/// Resolves links and search terms to streamable media through yt-dlp.
pub struct YtDlpResolver {
    binary: String,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Accepts search terms and links to YouTube; rejects links elsewhere.
    pub fn is_supported_query(query: &str) -> bool {
        let Ok(url) = Url::parse(query) else {
            return true;
        };

        match url.host_str() {
            Some(host) => {
                let host = host.strip_prefix("www.").unwrap_or(host);
                YOUTUBE_HOSTS.contains(&host)
            }
            None => true,
        }
    }

    pub async fn resolve_media(&self, query: &str) -> Result<MediaItem, ResolveError> {
        info!("🔍 Resolving: {}", query);

        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "-j",
            "-f",
            "bestaudio/best",
            "--no-playlist",
            "--no-warnings",
            "--default-search",
            "auto",
            "--",
            query,
        ])
        .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ResolveError::Timeout)??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp failed for {}: {}", query, stderr.trim());
            return Err(ResolveError::Failed(stderr.trim().to_string()));
        }

        let media = parse_media(&output.stdout)?;
        debug!("Resolved {} to {}", query, media.title);
        Ok(media)
    }
}

/// Reads the first JSON document yt-dlp printed; playlists yield their first entry.
fn parse_media(stdout: &[u8]) -> Result<MediaItem, ResolveError> {
    let line = stdout
        .split(|b| *b == b'\n')
        .find(|line| !line.iter().all(u8::is_ascii_whitespace))
        .ok_or(ResolveError::NoResults)?;

    let mut info: YtDlpOutput = serde_json::from_slice(line)?;
    if !info.entries.is_empty() {
        info = info.entries.swap_remove(0);
    }

    let source_url = info.url.ok_or(ResolveError::NoResults)?;
    Ok(MediaItem {
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        url: info.webpage_url.unwrap_or_else(|| source_url.clone()),
        source_url,
        duration: info.duration.map_or(0, |d| d.max(0.0) as u64),
        thumbnail_url: info.thumbnail,
        channel: info
            .channel
            .or(info.uploader)
            .unwrap_or_else(|| "Unknown".to_string()),
    })
}
