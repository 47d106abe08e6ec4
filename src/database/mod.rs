use crate::assets::MigrationAssets;
use crate::config::DatabaseConfig;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::utils::DateTimeParser;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

pub mod channels;
pub mod snapshots;
pub mod videos;

pub use videos::{UpsertSummary, UpsertedVideo};

/// SQLite backed metrics store
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` opens its own empty database.
        let max_connections = if in_memory {
            1
        } else {
            config.max_connections.unwrap_or(5)
        };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        debug!(url = %config.url, max_connections, "Opened SQLite pool");
        Ok(Self { pool })
    }

    /// Fresh migrated in-memory database, used by tests
    pub async fn new_in_memory() -> Result<Self> {
        let database = Self::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
        })
        .await?;
        database.migrate().await?;
        Ok(database)
    }

    pub async fn migrate(&self) -> Result<()> {
        self.run_embedded_migrations().await?;
        Ok(())
    }

    async fn run_embedded_migrations(&self) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _sqlx_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                success BOOLEAN NOT NULL,
                checksum BLOB NOT NULL,
                execution_time BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx("create _sqlx_migrations", e))?;

        for (name, content) in MigrationAssets::get_migrations() {
            // "001_initial_schema.sql" -> 1
            let version: i64 = name
                .split('_')
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| RepositoryError::MigrationFailed {
                    version: name.clone(),
                    message: "migration file name must start with a numeric version".to_string(),
                })?;

            let applied = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM _sqlx_migrations WHERE version = ? AND success = true",
            )
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx("check migration", e))?;

            if applied > 0 {
                continue;
            }

            let start = std::time::Instant::now();
            let migration_failed = |e: sqlx::Error| RepositoryError::MigrationFailed {
                version: name.clone(),
                message: e.to_string(),
            };

            let mut transaction = self.pool.begin().await.map_err(migration_failed)?;
            sqlx::query(&content)
                .execute(&mut *transaction)
                .await
                .map_err(migration_failed)?;

            let execution_time = start.elapsed().as_millis() as i64;
            sqlx::query(
                r#"
                INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time)
                VALUES (?, ?, true, ?, ?)
                "#,
            )
            .bind(version)
            .bind(&name)
            .bind(Self::calculate_checksum(&content))
            .bind(execution_time)
            .execute(&mut *transaction)
            .await
            .map_err(migration_failed)?;

            transaction.commit().await.map_err(migration_failed)?;
            info!("Applied migration: {} ({}ms)", name, execution_time);
        }

        Ok(())
    }

    fn calculate_checksum(content: &str) -> Vec<u8> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        hasher.finish().to_be_bytes().to_vec()
    }
}

pub(crate) fn timestamp(dt: &DateTime<Utc>) -> String {
    DateTimeParser::format_for_storage(dt)
}

pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> RepositoryResult<DateTime<Utc>> {
    let raw: String = row.get(column);
    DateTimeParser::parse_flexible(&raw)
        .map_err(|e| RepositoryError::invalid_value(column, e.to_string()))
}

pub(crate) fn get_optional_timestamp(
    row: &SqliteRow,
    column: &str,
) -> RepositoryResult<Option<DateTime<Utc>>> {
    row.get::<Option<String>, _>(column)
        .map(|raw| {
            DateTimeParser::parse_flexible(&raw)
                .map_err(|e| RepositoryError::invalid_value(column, e.to_string()))
        })
        .transpose()
}
