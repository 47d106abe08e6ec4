//! Refresh orchestration
//!
//! - [`gate`]: decides whether a channel is due
//! - [`channel`]: refreshes one channel and computes its delta
//! - [`job`]: the background refresh-all job with cooperative stop
//! - [`scheduler`]: cron driven refresh-all

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

pub mod channel;
pub mod gate;
pub mod job;
pub mod scheduler;

pub use channel::ChannelRefresher;
pub use gate::should_refresh;
pub use job::RefreshJobManager;
pub use scheduler::RefreshScheduler;

use crate::errors::{AppError, AppResult, RefreshError, RefreshResult, RepositoryError};
use crate::models::{
    normalize_channel_url, Channel, JobStart, Platform, RefreshJobSnapshot, RefreshOutcome,
};

/// Entry point of every refresh request, interactive or scheduled
#[derive(Clone)]
pub struct RefreshService {
    jobs: RefreshJobManager,
}

impl RefreshService {
    pub fn new(jobs: RefreshJobManager) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &RefreshJobManager {
        &self.jobs
    }

    /// Refresh one channel now, subject to the staleness gate unless `force`
    ///
    /// Refused with `AlreadyRunning` while a refresh-all job is active.
    pub async fn refresh_one(&self, channel_id: i64, force: bool) -> RefreshResult<RefreshOutcome> {
        let _writer = self.jobs.acquire_single_writer().await?;
        self.refresh_locked(channel_id, force).await
    }

    /// Single-channel refresh; the caller holds the writer lock
    async fn refresh_locked(&self, channel_id: i64, force: bool) -> RefreshResult<RefreshOutcome> {
        let refresher = self.jobs.refresher();

        let channel = refresher
            .database()
            .get_channel(channel_id)
            .await?
            .ok_or(RefreshError::ChannelNotFound { channel_id })?;

        let settings = self.jobs.settings().get().await;
        if !channel.is_due(settings.refresh_interval(), force, Utc::now()) {
            info!(channel_id, "Channel refreshed recently, skipping");
            return Ok(RefreshOutcome::skipped(channel.id, channel.title));
        }

        refresher
            .refresh_channel(
                &channel,
                settings.max_videos_per_channel,
                settings.cookies_file.as_deref(),
            )
            .await
    }

    /// Track a new channel and fetch it immediately
    ///
    /// Refused with `AlreadyRunning` before anything is stored while a
    /// refresh-all job is active. The channel is kept even when the first
    /// fetch fails; the failure is reported in the outcome and stored as the
    /// channel's last error.
    pub async fn add_channel(&self, raw_url: &str) -> AppResult<(Channel, RefreshOutcome)> {
        let url = normalize_channel_url(raw_url);
        if url.is_empty() {
            return Err(AppError::validation("Channel URL is required"));
        }
        let platform = Platform::from_url(&url).ok_or_else(|| {
            AppError::validation("Only YouTube, TikTok and Instagram channel URLs are supported")
        })?;

        let _writer = self.jobs.acquire_single_writer().await?;

        let database = self.jobs.refresher().database();
        if database.find_channel_by_url(&url).await?.is_some() {
            return Err(AppError::validation("This channel is already tracked"));
        }
        let channel = database
            .create_channel(platform, &url, &initial_title(&url), Utc::now())
            .await
            .map_err(|e| match e {
                RepositoryError::ConstraintViolation { .. } => {
                    AppError::validation("This channel is already tracked")
                }
                other => AppError::from(other),
            })?;

        let outcome = match self.refresh_locked(channel.id, true).await {
            Ok(outcome) => outcome,
            Err(RefreshError::AdapterUnavailable { message }) => {
                database.set_last_error(channel.id, Some(&message)).await?;
                RefreshOutcome::failed(channel.id, channel.title.clone(), message, None)
            }
            Err(e) => return Err(e.into()),
        };

        let channel = database
            .get_channel(channel.id)
            .await?
            .ok_or_else(|| AppError::not_found("channel", channel.id.to_string()))?;
        Ok((channel, outcome))
    }

    /// Stop tracking a channel, dropping its videos and snapshots
    ///
    /// Refused with `AlreadyRunning` while a refresh-all job is active.
    /// Returns `false` when the channel does not exist.
    pub async fn delete_channel(&self, channel_id: i64) -> AppResult<bool> {
        let _writer = self.jobs.acquire_single_writer().await?;
        let deleted = self.jobs.refresher().database().delete_channel(channel_id).await?;
        if deleted {
            info!(channel_id, "Channel deleted");
        }
        Ok(deleted)
    }

    pub async fn start_refresh_all(&self, force: bool) -> JobStart {
        self.jobs.start_refresh_all(force).await
    }

    pub async fn stop(&self, job_id: Uuid) -> RefreshResult<RefreshJobSnapshot> {
        self.jobs.stop(job_id).await
    }

    pub async fn status(&self, job_id: Uuid) -> RefreshResult<RefreshJobSnapshot> {
        self.jobs.status(job_id).await
    }

    pub async fn current(&self) -> Option<RefreshJobSnapshot> {
        self.jobs.current().await
    }
}

/// Placeholder title until the first successful fetch: the handle or last
/// meaningful path segment of the URL
fn initial_title(url: &str) -> String {
    let parsed = match url::Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };
    parsed
        .path_segments()
        .and_then(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .filter(|s| !matches!(*s, "shorts" | "videos" | "reels" | "featured"))
                .last()
                .map(str::to_string)
        })
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
