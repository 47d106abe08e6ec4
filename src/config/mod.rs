use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod settings;

pub use settings::{AppSettings, RuntimeSettingsStore, SettingsUpdate};

/// Environment prefix for overrides, e.g. `REELSTATS__WEB__PORT=9000`
pub const ENV_PREFIX: &str = "REELSTATS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub refresh: RefreshConfig,
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub avatar_path: PathBuf,
    /// TOML file holding the settings editable from the dashboard
    pub settings_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Cron expression (with seconds) for the background refresh; empty disables it
    pub schedule: String,
    /// Initial value of the runtime setting, used when no settings file exists
    pub default_interval_hours: u32,
    pub default_max_videos: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub ytdlp_path: String,
    pub socket_timeout_seconds: u32,
    /// Upper bound of per-video detail lookups for one channel
    pub max_detail_fetches: u32,
    pub avatar_cache_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/reelstats.db".to_string(),
                max_connections: Some(5),
            },
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("./data"),
                avatar_path: PathBuf::from("./data/avatars"),
                settings_file: PathBuf::from("./data/settings.toml"),
            },
            refresh: RefreshConfig {
                schedule: "0 0 * * * *".to_string(),
                default_interval_hours: settings::DEFAULT_REFRESH_INTERVAL_HOURS,
                default_max_videos: settings::DEFAULT_MAX_VIDEOS_PER_CHANNEL,
            },
            extractor: ExtractorConfig {
                ytdlp_path: "yt-dlp".to_string(),
                socket_timeout_seconds: 20,
                max_detail_fetches: 30,
                avatar_cache_enabled: true,
            },
        }
    }
}

impl Config {
    /// Load the configuration file, writing defaults when it does not exist,
    /// then apply `REELSTATS__SECTION__KEY` environment overrides
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(Path::new(&config_file))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = if path.exists() {
            std::fs::read_to_string(path)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &contents)?;
            contents
        };

        let config = config::Config::builder()
            .add_source(config::File::from_str(&contents, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Config>()?;

        Ok(config)
    }

    /// Create the data and avatar directories
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.storage.data_dir)?;
        std::fs::create_dir_all(&self.storage.avatar_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_written_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.refresh.schedule, "0 0 * * * *");
    }

    #[test]
    fn test_existing_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.web.port = 9191;
        config.refresh.schedule = String::new();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.web.port, 9191);
        assert!(loaded.refresh.schedule.is_empty());
    }
}
