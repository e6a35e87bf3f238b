use anyhow::Context;
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::{
    builder::CreateEmbed,
    model::{id::UserId, mention::Mentionable},
};
use songbird::input::{HttpRequest, Input};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{is_url, TrackResolver};
use crate::{
    audio::{
        error::PlayerError,
        track::{format_length, Playable, TrackRef, UNKNOWN_PLACEHOLDER},
    },
    ui::embeds::colors,
};

/// Handle to the yt-dlp executable plus the HTTP client used to stream what
/// it resolves.
#[derive(Clone)]
pub struct YtDlp {
    path: String,
    http: reqwest::Client,
}

impl YtDlp {
    pub fn new(path: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            http,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, PlayerError> {
        let output = Command::new(&self.path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("yt-dlp exited with an error")
                .trim()
                .to_string();
            return Err(PlayerError::Resolution(reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Fetches a fresh, short-lived audio locator for a page URL.
    async fn stream_url(&self, page_url: &str) -> Result<String, PlayerError> {
        let stdout = self
            .run(&[
                "-f",
                "bestaudio/best",
                "--get-url",
                "--no-playlist",
                "--no-warnings",
                page_url,
            ])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| PlayerError::Resolution(format!("no audio stream for {}", page_url)))
    }
}

impl fmt::Debug for YtDlp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YtDlp").field("path", &self.path).finish()
    }
}

/// One line of `--dump-json --flat-playlist` output. Flat playlist entries
/// carry fewer fields than a fully extracted video, hence the fallbacks.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    uploader_url: Option<String>,
    channel: Option<String>,
    channel_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpEntry {
    fn page_url(&self) -> Option<String> {
        self.webpage_url
            .clone()
            .or_else(|| self.url.clone().filter(|url| is_url(url)))
            .or_else(|| self.id.as_ref().map(|id| format!("https://youtu.be/{}", id)))
    }
}

/// Resolves queries and URLs through yt-dlp.
pub struct YtDlpResolver {
    ytdlp: Arc<YtDlp>,
    max_results: usize,
}

impl YtDlpResolver {
    pub fn new(ytdlp: YtDlp, max_results: usize) -> Self {
        Self {
            ytdlp: Arc::new(ytdlp),
            max_results,
        }
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Vec<TrackRef>, PlayerError> {
        let target = if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        };

        info!("🔍 Resolving with yt-dlp: {}", target);
        let stdout = self
            .ytdlp
            .run(&["--dump-json", "--flat-playlist", "--no-warnings", &target])
            .await?;

        let tracks = parse_listing(&stdout, requester, self.max_results, &self.ytdlp);
        if tracks.is_empty() {
            return Err(PlayerError::NotFound(query.to_string()));
        }

        info!("✅ yt-dlp returned {} tracks for {}", tracks.len(), query);
        Ok(tracks)
    }
}

fn parse_listing(stdout: &str, requester: UserId, limit: usize, ytdlp: &Arc<YtDlp>) -> Vec<TrackRef> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => RemoteTrack::from_entry(entry, requester, Arc::clone(ytdlp)),
            Err(e) => {
                debug!("Skipping unparseable yt-dlp line: {}", e);
                None
            }
        })
        .take(limit)
        .map(|track| Arc::new(track) as TrackRef)
        .collect()
}

/// Track hosted on a site yt-dlp understands.
#[derive(Debug)]
pub struct RemoteTrack {
    title: String,
    page_url: String,
    uploader: Option<String>,
    uploader_url: Option<String>,
    thumbnail: Option<String>,
    duration: Option<Duration>,
    requester: UserId,
    ytdlp: Arc<YtDlp>,
}

impl RemoteTrack {
    fn from_entry(entry: YtDlpEntry, requester: UserId, ytdlp: Arc<YtDlp>) -> Option<Self> {
        let page_url = entry.page_url()?;
        Some(Self {
            title: entry
                .title
                .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string()),
            page_url,
            uploader: entry.uploader.or(entry.channel),
            uploader_url: entry.uploader_url.or(entry.channel_url),
            thumbnail: entry
                .thumbnail
                .or_else(|| entry.thumbnails.into_iter().last().map(|t| t.url)),
            duration: entry
                .duration
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64),
            requester,
            ytdlp,
        })
    }
}

#[async_trait]
impl Playable for RemoteTrack {
    async fn generate_source(&self) -> Result<Input, PlayerError> {
        let stream = self.ytdlp.stream_url(&self.page_url).await.map_err(|e| {
            warn!("❌ Could not refresh stream for {}: {}", self.page_url, e);
            PlayerError::Resolution(format!("unable to find **{}** ({})", self.title, self.page_url))
        })?;

        debug!("🎯 Streaming {} from a fresh locator", self.title);
        Ok(HttpRequest::new(self.ytdlp.http.clone(), stream).into())
    }

    fn create_embed(&self) -> CreateEmbed {
        let uploader = match (&self.uploader, &self.uploader_url) {
            (Some(name), Some(url)) => format!("[{}]({})", name, url),
            (Some(name), None) => name.clone(),
            (None, _) => UNKNOWN_PLACEHOLDER.to_string(),
        };

        let mut embed = CreateEmbed::new()
            .title("Now playing")
            .description(format!("[{}]({})", self.title, self.page_url))
            .color(colors::NOW_PLAYING)
            .field("Duration", format_length(self.duration), true)
            .field("Requested by", self.requester.mention().to_string(), true)
            .field("Uploader", uploader, true);

        if let Some(thumbnail) = &self.thumbnail {
            embed = embed.image(thumbnail);
        }
        embed
    }

    fn name(&self) -> &str {
        &self.title
    }

    fn url(&self) -> Option<&str> {
        Some(&self.page_url)
    }

    fn length(&self) -> Option<Duration> {
        self.duration
    }

    fn author(&self) -> Option<&str> {
        self.uploader.as_deref()
    }

    fn requester(&self) -> UserId {
        self.requester
    }
}
