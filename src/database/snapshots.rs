use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{get_timestamp, timestamp};
use crate::analytics::ChannelAggregates;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::ChannelSnapshot;

/// Minimum spacing between two snapshots of the same channel
pub const SNAPSHOT_SPACING_HOURS: i64 = 24;

fn snapshot_from_row(row: &SqliteRow) -> RepositoryResult<ChannelSnapshot> {
    Ok(ChannelSnapshot {
        id: row.get("id"),
        channel_id: row.get("channel_id"),
        captured_at: get_timestamp(row, "captured_at")?,
        total_views: row.get("total_views"),
        total_likes: row.get("total_likes"),
        total_comments: row.get("total_comments"),
        subscriber_count: row.get("subscriber_count"),
    })
}

impl crate::database::Database {
    /// Store the current totals unless a snapshot younger than a day exists
    ///
    /// Returns whether a snapshot was written.
    pub async fn record_daily_snapshot(
        &self,
        channel_id: i64,
        aggregates: &ChannelAggregates,
        subscriber_count: Option<i64>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let recent_cutoff = now - Duration::hours(SNAPSHOT_SPACING_HOURS);
        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM channel_snapshots WHERE channel_id = ? AND captured_at > ?",
        )
        .bind(channel_id)
        .bind(timestamp(&recent_cutoff))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("record_daily_snapshot check", e))?;

        if recent > 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO channel_snapshots
                (channel_id, captured_at, total_views, total_likes, total_comments, subscriber_count)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(channel_id)
        .bind(timestamp(&now))
        .bind(aggregates.total_views)
        .bind(aggregates.total_likes)
        .bind(aggregates.total_comments)
        .bind(subscriber_count)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("record_daily_snapshot", e))?;

        Ok(true)
    }

    /// Newest snapshot captured at or before `threshold`
    pub async fn latest_snapshot_before(
        &self,
        channel_id: i64,
        threshold: DateTime<Utc>,
    ) -> RepositoryResult<Option<ChannelSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT id, channel_id, captured_at, total_views, total_likes, total_comments, subscriber_count
            FROM channel_snapshots
            WHERE channel_id = ? AND captured_at <= ?
            ORDER BY captured_at DESC
            LIMIT 1
            "#,
        )
        .bind(channel_id)
        .bind(timestamp(&threshold))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("latest_snapshot_before", e))?;

        row.as_ref().map(snapshot_from_row).transpose()
    }

    pub async fn list_snapshots(&self, channel_id: i64) -> RepositoryResult<Vec<ChannelSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT id, channel_id, captured_at, total_views, total_likes, total_comments, subscriber_count
            FROM channel_snapshots
            WHERE channel_id = ?
            ORDER BY captured_at ASC
            "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("list_snapshots", e))?;

        rows.iter().map(snapshot_from_row).collect()
    }
}
