//! Runtime settings editable from the dashboard
//!
//! Changes are applied immediately and persisted to a small TOML file so they
//! survive restarts. Each refresh invocation reads the settings once.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};

pub const DEFAULT_REFRESH_INTERVAL_HOURS: u32 = 6;
pub const DEFAULT_MAX_VIDEOS_PER_CHANNEL: u32 = 12;

pub const MIN_REFRESH_INTERVAL_HOURS: u32 = 1;
pub const MAX_REFRESH_INTERVAL_HOURS: u32 = 168;
pub const MIN_VIDEOS_PER_CHANNEL: u32 = 1;
pub const MAX_VIDEOS_PER_CHANNEL: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    pub refresh_interval_hours: u32,
    pub max_videos_per_channel: u32,
    /// Netscape cookies file handed to the extractor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            refresh_interval_hours: DEFAULT_REFRESH_INTERVAL_HOURS,
            max_videos_per_channel: DEFAULT_MAX_VIDEOS_PER_CHANNEL,
            cookies_file: None,
        }
    }
}

impl AppSettings {
    pub fn refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.refresh_interval_hours))
    }

    /// Clamp numeric values into their accepted ranges
    pub fn clamped(mut self) -> Self {
        self.refresh_interval_hours = self
            .refresh_interval_hours
            .clamp(MIN_REFRESH_INTERVAL_HOURS, MAX_REFRESH_INTERVAL_HOURS);
        self.max_videos_per_channel = self
            .max_videos_per_channel
            .clamp(MIN_VIDEOS_PER_CHANNEL, MAX_VIDEOS_PER_CHANNEL);
        self.cookies_file = self
            .cookies_file
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        self
    }
}

/// Partial update submitted by the settings form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub refresh_interval_hours: Option<i64>,
    pub max_videos_per_channel: Option<i64>,
    pub cookies_file: Option<String>,
}

#[derive(Clone)]
pub struct RuntimeSettingsStore {
    settings: Arc<RwLock<AppSettings>>,
    path: Option<PathBuf>,
}

impl RuntimeSettingsStore {
    /// Store that is never persisted
    pub fn in_memory(settings: AppSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings.clamped())),
            path: None,
        }
    }

    /// Load settings from `path`, falling back to `defaults` when the file is
    /// missing or unreadable
    pub fn load(path: &Path, defaults: AppSettings) -> Self {
        let settings = match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppSettings>(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring invalid settings file {}: {}", path.display(), e);
                    defaults
                }
            },
            Err(_) => defaults,
        };

        Self {
            settings: Arc::new(RwLock::new(settings.clamped())),
            path: Some(path.to_path_buf()),
        }
    }

    pub async fn get(&self) -> AppSettings {
        self.settings.read().await.clone()
    }

    /// Apply an update, clamp it, and persist the result
    pub async fn update(&self, update: SettingsUpdate) -> AppResult<AppSettings> {
        let mut guard = self.settings.write().await;
        let mut next = guard.clone();

        if let Some(hours) = update.refresh_interval_hours {
            next.refresh_interval_hours = clamp_to_u32(hours);
        }
        if let Some(max_videos) = update.max_videos_per_channel {
            next.max_videos_per_channel = clamp_to_u32(max_videos);
        }
        if let Some(cookies_file) = update.cookies_file {
            next.cookies_file = Some(cookies_file);
        }
        let next = next.clamped();

        if let Some(path) = &self.path {
            persist(path, &next)?;
        }

        info!(
            refresh_interval_hours = next.refresh_interval_hours,
            max_videos_per_channel = next.max_videos_per_channel,
            cookies = next.cookies_file.is_some(),
            "Runtime settings updated"
        );
        *guard = next.clone();
        Ok(next)
    }
}

fn clamp_to_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn persist(path: &Path, settings: &AppSettings) -> AppResult<()> {
    let contents = toml::to_string_pretty(settings)
        .map_err(|e| AppError::internal(format!("failed to serialize settings: {}", e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::configuration(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, contents).map_err(|e| {
        AppError::configuration(format!("cannot write {}: {}", path.display(), e))
    })
}
