//! yt-dlp backed extraction adapter
//!
//! The channel listing is fetched with `--flat-playlist`, which is fast but
//! often lacks counts and dates. Entries missing a view count or a publish
//! date get a second, per-video lookup.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{FetchRequest, VideoExtractor};
use crate::config::ExtractorConfig;
use crate::errors::{ExtractionError, ExtractionErrorKind};
use crate::models::{ChannelPayload, Platform, VideoRecord};
use crate::utils::DateTimeParser;

#[derive(Debug, Clone, Default, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    channel_url: Option<String>,
    #[serde(default)]
    uploader_url: Option<String>,
    #[serde(default)]
    channel_follower_count: Option<i64>,
    #[serde(default)]
    view_count: Option<i64>,
    #[serde(default)]
    like_count: Option<i64>,
    #[serde(default)]
    comment_count: Option<i64>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    uploader_avatar: Option<String>,
    #[serde(default)]
    channel_thumbnail: Option<String>,
    #[serde(default)]
    entries: Vec<YtDlpInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YtDlpThumbnail {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

pub struct YtDlpExtractor {
    binary_path: String,
    socket_timeout_seconds: u32,
    max_detail_fetches: u32,
}

impl YtDlpExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            binary_path: config.ytdlp_path.clone(),
            socket_timeout_seconds: config.socket_timeout_seconds,
            max_detail_fetches: config.max_detail_fetches,
        }
    }

    fn common_args(&self, cookies_file: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_seconds.to_string(),
        ];
        if let Some(cookies) = cookies_file.filter(|c| !c.trim().is_empty()) {
            args.push("--cookies".to_string());
            args.push(cookies.to_string());
        }
        args
    }

    fn listing_args(&self, request: &FetchRequest) -> Vec<String> {
        let mut args = self.common_args(request.cookies_file.as_deref());
        args.push("--flat-playlist".to_string());
        args.push("--playlist-end".to_string());
        args.push(request.limit.max(1).to_string());
        args.push(request.channel_url.clone());
        args
    }

    fn detail_args(&self, video_url: &str, cookies_file: Option<&str>) -> Vec<String> {
        let mut args = self.common_args(cookies_file);
        args.push("--no-playlist".to_string());
        args.push(video_url.to_string());
        args
    }

    async fn run_json(&self, platform: Platform, args: &[String]) -> Result<YtDlpInfo, ExtractionError> {
        let output = Command::new(&self.binary_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractionError::unavailable(format!(
                        "'{}' was not found; install yt-dlp or set extractor.ytdlp_path",
                        self.binary_path
                    ))
                } else {
                    ExtractionError::failed(
                        platform,
                        ExtractionErrorKind::Other,
                        format!("Failed to spawn {}: {}", self.binary_path, e),
                    )
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(platform, &stderr));
        }

        serde_json::from_slice::<YtDlpInfo>(&output.stdout).map_err(|e| {
            ExtractionError::failed(
                platform,
                ExtractionErrorKind::InvalidOutput,
                format!("Could not decode yt-dlp output: {}", e),
            )
        })
    }
}

#[async_trait]
impl VideoExtractor for YtDlpExtractor {
    async fn fetch_recent_videos(
        &self,
        request: &FetchRequest,
    ) -> Result<ChannelPayload, ExtractionError> {
        let platform = request.platform;
        let listing = self.run_json(platform, &self.listing_args(request)).await?;
        let mut payload = payload_from_info(listing, &request.channel_url, request.limit);

        let mut detail_budget = self.max_detail_fetches;
        for record in payload.videos.iter_mut() {
            if !needs_details(record) || detail_budget == 0 {
                continue;
            }
            detail_budget -= 1;

            let args = self.detail_args(&record.url, request.cookies_file.as_deref());
            match self.run_json(platform, &args).await {
                Ok(details) => merge_details(record, details),
                Err(ExtractionError::AdapterUnavailable { message }) => {
                    return Err(ExtractionError::unavailable(message));
                }
                Err(e) => {
                    debug!(video = %record.url, "Detail lookup failed: {}", e);
                }
            }
        }

        if payload.videos.is_empty() {
            return Err(ExtractionError::failed(
                platform,
                ExtractionErrorKind::EmptyResult,
                "No videos returned for this channel",
            ));
        }

        debug!(
            url = %request.channel_url,
            videos = payload.videos.len(),
            "Fetched channel listing"
        );
        Ok(payload)
    }
}

/// Map a failed yt-dlp run to a classified extraction error
pub fn classify_failure(platform: Platform, stderr: &str) -> ExtractionError {
    let detail = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("yt-dlp exited with an error")
        .to_string();
    let lower = stderr.to_lowercase();

    let (kind, message) = if lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("rate limit")
        || lower.contains("rate-limit")
    {
        (
            ExtractionErrorKind::RateLimited,
            "Source rate-limited the request (HTTP 429). Please try again later.".to_string(),
        )
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("login")
        || lower.contains("cookies")
    {
        (
            ExtractionErrorKind::Unauthorized,
            format!("Access denied, valid cookies may be required: {}", detail),
        )
    } else if lower.contains("unable to extract") || lower.contains("blocked") {
        let message = if platform == Platform::Instagram {
            "Instagram extraction is currently blocked. Try again later, update yt-dlp, or refresh with valid cookies.".to_string()
        } else {
            format!("Extraction blocked by the platform: {}", detail)
        };
        (ExtractionErrorKind::Blocked, message)
    } else if lower.contains("404")
        || lower.contains("does not exist")
        || lower.contains("not found")
    {
        (
            ExtractionErrorKind::NotFound,
            format!("Channel not found: {}", detail),
        )
    } else {
        (
            ExtractionErrorKind::Other,
            format!("Failed to fetch channel: {}", detail),
        )
    };

    warn!(%platform, ?kind, "yt-dlp failed: {}", detail);
    ExtractionError::failed(platform, kind, message)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn http_url(value: Option<String>) -> Option<String> {
    non_empty(value).filter(|v| v.starts_with("http"))
}

/// Largest thumbnail, optionally restricted to roughly square images
fn pick_thumbnail(thumbnails: &[YtDlpThumbnail], square_only: bool) -> Option<String> {
    thumbnails
        .iter()
        .filter_map(|t| {
            let url = http_url(t.url.clone())?;
            let (w, h) = (t.width.unwrap_or(0), t.height.unwrap_or(0));
            if square_only {
                if w == 0 || h == 0 {
                    return None;
                }
                let ratio = f64::from(w) / f64::from(h);
                if !(0.8..=1.25).contains(&ratio) {
                    return None;
                }
            }
            Some((u64::from(w) * u64::from(h), url))
        })
        .max_by_key(|(area, _)| *area)
        .map(|(_, url)| url)
}

fn published_at(info: &YtDlpInfo) -> Option<chrono::DateTime<chrono::Utc>> {
    info.upload_date
        .as_deref()
        .and_then(|d| DateTimeParser::parse_upload_date(d).ok())
        .or_else(|| info.timestamp.and_then(|t| DateTimeParser::from_unix_seconds(t).ok()))
}

fn video_from_entry(entry: YtDlpInfo) -> Option<VideoRecord> {
    let raw_url = non_empty(entry.url.clone()).or_else(|| non_empty(entry.webpage_url.clone()))?;
    let url = if raw_url.starts_with("http") {
        raw_url
    } else {
        format!("https://www.youtube.com/watch?v={}", raw_url)
    };
    let platform_video_id = non_empty(entry.id.clone()).unwrap_or_else(|| url.clone());
    let published_at = published_at(&entry);
    let thumbnail_url =
        http_url(entry.thumbnail.clone()).or_else(|| pick_thumbnail(&entry.thumbnails, false));

    Some(VideoRecord {
        platform_video_id,
        title: non_empty(entry.title).unwrap_or_else(|| "Untitled video".to_string()),
        url,
        view_count: entry.view_count,
        like_count: entry.like_count,
        comment_count: entry.comment_count,
        published_at,
        duration_seconds: entry.duration.map(|d| d.round() as i64),
        thumbnail_url,
    })
}

fn payload_from_info(info: YtDlpInfo, source_url: &str, limit: u32) -> ChannelPayload {
    let avatar_url = http_url(info.avatar_url.clone())
        .or_else(|| http_url(info.uploader_avatar.clone()))
        .or_else(|| http_url(info.channel_thumbnail.clone()))
        .or_else(|| pick_thumbnail(&info.thumbnails, true));

    let title = non_empty(info.title.clone())
        .or_else(|| non_empty(info.channel.clone()))
        .or_else(|| non_empty(info.uploader.clone()));

    let url = http_url(info.webpage_url.clone())
        .or_else(|| http_url(info.channel_url.clone()))
        .or_else(|| http_url(info.uploader_url.clone()))
        .unwrap_or_else(|| source_url.to_string());

    let videos = info
        .entries
        .into_iter()
        .take(limit as usize)
        .filter_map(video_from_entry)
        .collect();

    ChannelPayload {
        title,
        url: Some(url),
        avatar_url,
        subscriber_count: info.channel_follower_count,
        videos,
    }
}

fn needs_details(record: &VideoRecord) -> bool {
    record.view_count.is_none() || record.published_at.is_none()
}

/// Fill a listing record with values from a per-video lookup
fn merge_details(record: &mut VideoRecord, details: YtDlpInfo) {
    if let Some(title) = non_empty(details.title.clone()) {
        record.title = title;
    }
    if let Some(url) = http_url(details.webpage_url.clone()) {
        record.url = url;
    }
    record.published_at = published_at(&details).or(record.published_at);
    record.view_count = details.view_count.or(record.view_count);
    record.like_count = details.like_count.or(record.like_count);
    record.comment_count = details.comment_count.or(record.comment_count);
    record.duration_seconds = details
        .duration
        .map(|d| d.round() as i64)
        .or(record.duration_seconds);
    record.thumbnail_url = http_url(details.thumbnail.clone())
        .or_else(|| pick_thumbnail(&details.thumbnails, false))
        .or(record.thumbnail_url.take());
}
