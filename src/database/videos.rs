use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::{get_optional_timestamp, get_timestamp, timestamp};
use crate::analytics::ChannelAggregates;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{ChannelPayload, Video, VideoChange, VideoCounts, VideoDelta, VideoRecord};

/// What one refresh wrote to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub videos_fetched: usize,
    pub new_videos: usize,
    /// Already stored videos whose counts moved, in payload order
    pub changes: Vec<VideoChange>,
}

/// Result of upserting one video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertedVideo {
    pub is_new: bool,
    pub delta: VideoDelta,
}

fn video_from_row(row: &SqliteRow) -> RepositoryResult<Video> {
    Ok(Video {
        id: row.get("id"),
        channel_id: row.get("channel_id"),
        platform_video_id: row.get("platform_video_id"),
        title: row.get("title"),
        url: row.get("url"),
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        published_at: get_optional_timestamp(row, "published_at")?,
        duration_seconds: row.get("duration_seconds"),
        thumbnail_url: row.get("thumbnail_url"),
        view_delta: row.get("view_delta"),
        like_delta: row.get("like_delta"),
        comment_delta: row.get("comment_delta"),
        first_seen_at: get_timestamp(row, "first_seen_at")?,
        last_updated_at: get_timestamp(row, "last_updated_at")?,
    })
}

/// Insert or update one video keyed by `(channel_id, platform_video_id)`
///
/// Counts are overwritten; optional values missing from `record` keep what is
/// stored. The count changes against the stored row are written along with
/// the counts.
async fn upsert_video_with(
    conn: &mut SqliteConnection,
    channel_id: i64,
    record: &VideoRecord,
    now: &str,
) -> Result<UpsertedVideo, sqlx::Error> {
    let existing = sqlx::query(
        "SELECT id, view_count, like_count, comment_count FROM videos \
         WHERE channel_id = ? AND platform_video_id = ?",
    )
    .bind(channel_id)
    .bind(&record.platform_video_id)
    .fetch_optional(&mut *conn)
    .await?;

    let published_at = record.published_at.as_ref().map(timestamp);
    let incoming = VideoCounts::from(record);

    match existing {
        Some(row) => {
            let video_id: i64 = row.get("id");
            let stored = VideoCounts {
                view_count: row.get("view_count"),
                like_count: row.get("like_count"),
                comment_count: row.get("comment_count"),
            };
            let delta = VideoDelta::between(&stored, &incoming);

            sqlx::query(
                r#"
                UPDATE videos SET
                    title = ?,
                    url = ?,
                    view_count = COALESCE(?, view_count),
                    like_count = COALESCE(?, like_count),
                    comment_count = COALESCE(?, comment_count),
                    published_at = COALESCE(?, published_at),
                    duration_seconds = COALESCE(?, duration_seconds),
                    thumbnail_url = COALESCE(?, thumbnail_url),
                    view_delta = ?,
                    like_delta = ?,
                    comment_delta = ?,
                    last_updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&record.title)
            .bind(&record.url)
            .bind(record.view_count)
            .bind(record.like_count)
            .bind(record.comment_count)
            .bind(published_at)
            .bind(record.duration_seconds)
            .bind(record.thumbnail_url.as_deref())
            .bind(delta.views)
            .bind(delta.likes)
            .bind(delta.comments)
            .bind(now)
            .bind(video_id)
            .execute(&mut *conn)
            .await?;
            Ok(UpsertedVideo {
                is_new: false,
                delta,
            })
        }
        None => {
            let delta = VideoDelta::between(&VideoCounts::default(), &incoming);

            sqlx::query(
                r#"
                INSERT INTO videos (
                    channel_id, platform_video_id, title, url, view_count, like_count,
                    comment_count, published_at, duration_seconds, thumbnail_url,
                    view_delta, like_delta, comment_delta, first_seen_at, last_updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(channel_id)
            .bind(&record.platform_video_id)
            .bind(&record.title)
            .bind(&record.url)
            .bind(record.view_count)
            .bind(record.like_count)
            .bind(record.comment_count)
            .bind(published_at)
            .bind(record.duration_seconds)
            .bind(record.thumbnail_url.as_deref())
            .bind(delta.views)
            .bind(delta.likes)
            .bind(delta.comments)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            Ok(UpsertedVideo {
                is_new: true,
                delta,
            })
        }
    }
}

impl crate::database::Database {
    /// Upsert a single video outside of a refresh
    pub async fn upsert_video(
        &self,
        channel_id: i64,
        record: &VideoRecord,
        now: DateTime<Utc>,
    ) -> RepositoryResult<UpsertedVideo> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepositoryError::from_sqlx("upsert_video acquire", e))?;
        upsert_video_with(&mut conn, channel_id, record, &timestamp(&now))
            .await
            .map_err(|e| RepositoryError::from_sqlx("upsert_video", e))
    }

    /// Store the result of a successful fetch in one transaction
    ///
    /// Upserts every video, updates the channel metadata, sets
    /// `last_refreshed_at = now` and clears `last_error`. Stored videos absent
    /// from the payload are left untouched. Nothing is written on error.
    pub async fn apply_refresh(
        &self,
        channel_id: i64,
        payload: &ChannelPayload,
        now: DateTime<Utc>,
    ) -> RepositoryResult<UpsertSummary> {
        let now = timestamp(&now);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::from_sqlx("apply_refresh begin", e))?;

        let mut summary = UpsertSummary::default();
        for record in &payload.videos {
            let upserted = upsert_video_with(&mut tx, channel_id, record, &now)
                .await
                .map_err(|e| RepositoryError::from_sqlx("upsert_video", e))?;
            summary.videos_fetched += 1;
            if upserted.is_new {
                summary.new_videos += 1;
            } else if !upserted.delta.is_zero() {
                summary.changes.push(VideoChange {
                    platform_video_id: record.platform_video_id.clone(),
                    title: record.title.clone(),
                    delta: upserted.delta,
                });
            }
        }

        let title = payload
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        sqlx::query(
            r#"
            UPDATE channels SET
                title = COALESCE(?, title),
                avatar_url = COALESCE(?, avatar_url),
                subscriber_count = COALESCE(?, subscriber_count),
                last_refreshed_at = ?,
                last_error = NULL
            WHERE id = ?
            "#,
        )
        .bind(title)
        .bind(payload.avatar_url.as_deref())
        .bind(payload.subscriber_count)
        .bind(&now)
        .bind(channel_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_sqlx("apply_refresh channel", e))?;

        // The canonical url reported by the platform replaces the submitted one
        // unless another channel already tracks it.
        if let Some(url) = payload.url.as_deref().filter(|u| !u.trim().is_empty()) {
            sqlx::query(
                "UPDATE channels SET url = ? WHERE id = ? \
                 AND NOT EXISTS (SELECT 1 FROM channels WHERE url = ? AND id != ?)",
            )
            .bind(url)
            .bind(channel_id)
            .bind(url)
            .bind(channel_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_sqlx("apply_refresh url", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::from_sqlx("apply_refresh commit", e))?;

        debug!(
            channel_id,
            videos_fetched = summary.videos_fetched,
            new_videos = summary.new_videos,
            changed_videos = summary.changes.len(),
            "Refresh stored"
        );
        Ok(summary)
    }

    /// Videos of a channel, newest first; undated videos last
    pub async fn list_videos(
        &self,
        channel_id: i64,
        limit: Option<u32>,
    ) -> RepositoryResult<Vec<Video>> {
        let rows = sqlx::query(
            r#"
            SELECT id, channel_id, platform_video_id, title, url, view_count, like_count,
                   comment_count, published_at, duration_seconds, thumbnail_url,
                   view_delta, like_delta, comment_delta, first_seen_at, last_updated_at
            FROM videos
            WHERE channel_id = ?
            ORDER BY published_at IS NULL, published_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(channel_id)
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("list_videos", e))?;

        rows.iter().map(video_from_row).collect()
    }

    pub async fn video_counts(&self, channel_id: i64) -> RepositoryResult<Vec<VideoCounts>> {
        let rows = sqlx::query(
            "SELECT view_count, like_count, comment_count FROM videos WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("video_counts", e))?;

        Ok(rows
            .iter()
            .map(|row| VideoCounts {
                view_count: row.get("view_count"),
                like_count: row.get("like_count"),
                comment_count: row.get("comment_count"),
            })
            .collect())
    }

    /// Aggregates over every stored video of a channel
    pub async fn get_channel_aggregates(&self, channel_id: i64) -> RepositoryResult<ChannelAggregates> {
        let counts = self.video_counts(channel_id).await?;
        Ok(ChannelAggregates::from_counts(&counts))
    }
}
