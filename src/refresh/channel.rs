//! Refresh of a single channel: fetch, upsert, delta

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analytics::{AggregateDelta, ChannelAggregates};
use crate::avatars::AvatarCache;
use crate::database::Database;
use crate::errors::{ExtractionError, ExtractionErrorKind, RefreshError, RefreshResult};
use crate::extractor::{FetchRequest, VideoExtractor};
use crate::models::{Channel, OutcomeKind, RefreshOutcome};

/// Fetches one channel and stores the result
///
/// Per-channel failures are returned as `Failed` outcomes; only failures that
/// make every further fetch pointless are returned as errors.
#[derive(Clone)]
pub struct ChannelRefresher {
    database: Database,
    extractor: Arc<dyn VideoExtractor>,
    avatars: Option<AvatarCache>,
}

impl ChannelRefresher {
    pub fn new(database: Database, extractor: Arc<dyn VideoExtractor>) -> Self {
        Self {
            database,
            extractor,
            avatars: None,
        }
    }

    pub fn with_avatar_cache(mut self, avatars: AvatarCache) -> Self {
        self.avatars = Some(avatars);
        self
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub async fn refresh_channel(
        &self,
        channel: &Channel,
        max_videos: u32,
        cookies_file: Option<&str>,
    ) -> RefreshResult<RefreshOutcome> {
        let before = match self.database.get_channel_aggregates(channel.id).await {
            Ok(before) => before,
            Err(e) => return Ok(self.record_failure(channel, e.to_string(), None).await),
        };

        let request = FetchRequest {
            platform: channel.platform,
            channel_url: channel.url.clone(),
            limit: max_videos,
            cookies_file: cookies_file.map(str::to_string),
        };

        let payload = match self.extractor.fetch_recent_videos(&request).await {
            Ok(payload) if payload.videos.is_empty() => {
                let reason = "No videos returned for this channel".to_string();
                return Ok(self
                    .record_failure(channel, reason, Some(ExtractionErrorKind::EmptyResult))
                    .await);
            }
            Ok(payload) => payload,
            Err(ExtractionError::AdapterUnavailable { message }) => {
                return Err(RefreshError::AdapterUnavailable { message });
            }
            Err(e) => {
                let kind = e.kind();
                return Ok(self.record_failure(channel, e.reason(), kind).await);
            }
        };

        let now = Utc::now();
        let summary = match self.database.apply_refresh(channel.id, &payload, now).await {
            Ok(summary) => summary,
            Err(e) => {
                let reason = format!("Failed to store refresh: {}", e);
                return Ok(self.record_failure(channel, reason, None).await);
            }
        };

        // The refresh is committed at this point; a failed read only costs the
        // delta and today's snapshot.
        let after = match self.database.get_channel_aggregates(channel.id).await {
            Ok(after) => Some(after),
            Err(e) => {
                warn!(channel_id = channel.id, "Failed to read aggregates after refresh: {}", e);
                None
            }
        };
        let delta = refresh_delta(&before, after.as_ref());

        if let Some(after) = &after {
            let subscriber_count = payload.subscriber_count.or(channel.subscriber_count);
            if let Err(e) = self
                .database
                .record_daily_snapshot(channel.id, after, subscriber_count, now)
                .await
            {
                warn!(channel_id = channel.id, "Failed to record snapshot: {}", e);
            }
        }

        if let (Some(avatars), Some(remote)) = (&self.avatars, payload.avatar_url.as_deref()) {
            if !AvatarCache::is_cached_reference(remote) {
                match avatars.cache_avatar(channel.id, remote).await {
                    Ok(local) => {
                        if let Err(e) = self.database.set_avatar_url(channel.id, &local).await {
                            warn!(channel_id = channel.id, "Failed to store avatar path: {}", e);
                        }
                    }
                    Err(e) => warn!(channel_id = channel.id, "Avatar caching failed: {}", e),
                }
            }
        }

        let title = payload
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| channel.title.clone());

        info!(
            channel_id = channel.id,
            videos_fetched = summary.videos_fetched,
            new_videos = summary.new_videos,
            total_views = after.as_ref().map(|a| a.total_views),
            "Channel refreshed"
        );

        Ok(RefreshOutcome::new(
            channel.id,
            title,
            OutcomeKind::Refreshed {
                videos_fetched: summary.videos_fetched,
                new_videos: summary.new_videos,
                delta,
                video_changes: summary.changes,
            },
        ))
    }

    /// Store `last_error` and build the failed outcome
    ///
    /// `last_refreshed_at` is left untouched.
    async fn record_failure(
        &self,
        channel: &Channel,
        reason: String,
        kind: Option<ExtractionErrorKind>,
    ) -> RefreshOutcome {
        warn!(channel_id = channel.id, url = %channel.url, "Refresh failed: {}", reason);
        if let Err(e) = self.database.set_last_error(channel.id, Some(&reason)).await {
            warn!(channel_id = channel.id, "Failed to record last error: {}", e);
        }
        RefreshOutcome::failed(channel.id, channel.title.clone(), reason, kind)
    }
}

/// Channel delta of one refresh
///
/// `None` on the first refresh of a channel or when the aggregates after the
/// refresh could not be read.
fn refresh_delta(
    before: &ChannelAggregates,
    after: Option<&ChannelAggregates>,
) -> Option<AggregateDelta> {
    if before.video_count == 0 {
        return None;
    }
    after.map(|after| after.delta_since(before))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoCounts;

    fn aggregates(views: &[i64]) -> ChannelAggregates {
        let counts: Vec<VideoCounts> = views
            .iter()
            .map(|v| VideoCounts {
                view_count: Some(*v),
                ..Default::default()
            })
            .collect();
        ChannelAggregates::from_counts(&counts)
    }

    #[test]
    fn test_refresh_delta() {
        let before = aggregates(&[100, 200]);
        let after = aggregates(&[150, 200, 50]);

        let delta = refresh_delta(&before, Some(&after)).unwrap();
        assert_eq!(delta.total_views, 100);

        assert!(refresh_delta(&before, None).is_none());
        assert!(refresh_delta(&aggregates(&[]), Some(&after)).is_none());
    }
}
