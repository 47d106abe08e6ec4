use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use super::{get_optional_timestamp, get_timestamp, timestamp};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Channel, Platform};

const CHANNEL_COLUMNS: &str = "id, platform, url, title, avatar_url, subscriber_count, \
     created_at, last_refreshed_at, last_error";

fn channel_from_row(row: &SqliteRow) -> RepositoryResult<Channel> {
    let platform: String = row.get("platform");
    Ok(Channel {
        id: row.get("id"),
        platform: platform
            .parse::<Platform>()
            .map_err(|e| RepositoryError::invalid_value("platform", e))?,
        url: row.get("url"),
        title: row.get("title"),
        avatar_url: row.get("avatar_url"),
        subscriber_count: row.get("subscriber_count"),
        created_at: get_timestamp(row, "created_at")?,
        last_refreshed_at: get_optional_timestamp(row, "last_refreshed_at")?,
        last_error: row.get("last_error"),
    })
}

impl crate::database::Database {
    /// All channels in ascending id order
    pub async fn list_channels(&self) -> RepositoryResult<Vec<Channel>> {
        let query = format!("SELECT {} FROM channels ORDER BY id ASC", CHANNEL_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx("list_channels", e))?;

        rows.iter().map(channel_from_row).collect()
    }

    pub async fn get_channel(&self, channel_id: i64) -> RepositoryResult<Option<Channel>> {
        let query = format!("SELECT {} FROM channels WHERE id = ?", CHANNEL_COLUMNS);
        let row = sqlx::query(&query)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx("get_channel", e))?;

        row.as_ref().map(channel_from_row).transpose()
    }

    pub async fn find_channel_by_url(&self, url: &str) -> RepositoryResult<Option<Channel>> {
        let query = format!("SELECT {} FROM channels WHERE url = ?", CHANNEL_COLUMNS);
        let row = sqlx::query(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx("find_channel_by_url", e))?;

        row.as_ref().map(channel_from_row).transpose()
    }

    /// Insert a new channel that has never been refreshed
    ///
    /// A duplicate url fails with [`RepositoryError::ConstraintViolation`].
    pub async fn create_channel(
        &self,
        platform: Platform,
        url: &str,
        title: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Channel> {
        let result = sqlx::query(
            "INSERT INTO channels (platform, url, title, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(platform.as_str())
        .bind(url)
        .bind(title)
        .bind(timestamp(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("create_channel", e))?;

        let channel_id = result.last_insert_rowid();
        info!(channel_id, %platform, url, "Channel created");

        self.get_channel(channel_id)
            .await?
            .ok_or_else(|| RepositoryError::record_not_found("channels", "id", channel_id.to_string()))
    }

    /// Delete a channel together with its videos and snapshots
    ///
    /// Returns `false` when the channel does not exist.
    pub async fn delete_channel(&self, channel_id: i64) -> RepositoryResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::from_sqlx("delete_channel begin", e))?;

        for statement in [
            "DELETE FROM videos WHERE channel_id = ?",
            "DELETE FROM channel_snapshots WHERE channel_id = ?",
        ] {
            sqlx::query(statement)
                .bind(channel_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::from_sqlx(statement, e))?;
        }

        let deleted = sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(channel_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_sqlx("delete_channel", e))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| RepositoryError::from_sqlx("delete_channel commit", e))?;

        if deleted > 0 {
            info!(channel_id, "Channel deleted");
        }
        Ok(deleted > 0)
    }

    pub async fn set_last_refreshed(
        &self,
        channel_id: i64,
        refreshed_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        sqlx::query("UPDATE channels SET last_refreshed_at = ? WHERE id = ?")
            .bind(timestamp(&refreshed_at))
            .bind(channel_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx("set_last_refreshed", e))?;
        Ok(())
    }

    /// Record (or clear) the reason of the most recent failed refresh
    pub async fn set_last_error(
        &self,
        channel_id: i64,
        error: Option<&str>,
    ) -> RepositoryResult<()> {
        sqlx::query("UPDATE channels SET last_error = ? WHERE id = ?")
            .bind(error)
            .bind(channel_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx("set_last_error", e))?;
        Ok(())
    }

    pub async fn set_avatar_url(&self, channel_id: i64, avatar_url: &str) -> RepositoryResult<()> {
        sqlx::query("UPDATE channels SET avatar_url = ? WHERE id = ?")
            .bind(avatar_url)
            .bind(channel_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx("set_avatar_url", e))?;
        Ok(())
    }
}
