use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod refresh;
pub mod video;

pub use refresh::*;
pub use video::*;

/// Short-video platform a channel lives on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
}

impl Platform {
    /// Display order used for dashboard grouping
    pub const ALL: [Platform; 3] = [Platform::YouTube, Platform::TikTok, Platform::Instagram];

    /// Identifier stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::TikTok => "TikTok",
            Platform::Instagram => "Instagram",
        }
    }

    /// Detect the platform from a channel or video URL host
    pub fn from_url(raw_url: &str) -> Option<Platform> {
        let parsed = url::Url::parse(raw_url.trim()).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        if host.ends_with("youtube.com") || host == "youtu.be" {
            Some(Platform::YouTube)
        } else if host.ends_with("tiktok.com") {
            Some(Platform::TikTok)
        } else if host.ends_with("instagram.com") {
            Some(Platform::Instagram)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::YouTube),
            "tiktok" => Ok(Platform::TikTok),
            "instagram" => Ok(Platform::Instagram),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// A tracked creator account on one platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: i64,
    pub platform: Platform,
    pub url: String,
    pub title: String,
    pub avatar_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Metadata returned by the extraction adapter for a channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub title: Option<String>,
    pub url: Option<String>,
    pub avatar_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub videos: Vec<VideoRecord>,
}

/// Normalize user input into a channel URL
///
/// A bare `@handle` is treated as a YouTube handle.
pub fn normalize_channel_url(raw: &str) -> String {
    let cleaned = raw.trim();
    if cleaned.starts_with('@') {
        format!("https://www.youtube.com/{}", cleaned)
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        assert_eq!(
            Platform::from_url("https://www.youtube.com/@someone/shorts"),
            Some(Platform::YouTube)
        );
        assert_eq!(Platform::from_url("https://youtu.be/abc"), Some(Platform::YouTube));
        assert_eq!(
            Platform::from_url("https://www.tiktok.com/@dancer"),
            Some(Platform::TikTok)
        );
        assert_eq!(
            Platform::from_url("https://instagram.com/someone/"),
            Some(Platform::Instagram)
        );
        assert_eq!(Platform::from_url("https://twitch.tv/streamer"), None);
        assert_eq!(Platform::from_url("not a url"), None);
    }

    #[test]
    fn test_platform_round_trips_through_storage_name() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(
            normalize_channel_url("  @creator "),
            "https://www.youtube.com/@creator"
        );
        assert_eq!(
            normalize_channel_url("https://www.tiktok.com/@x"),
            "https://www.tiktok.com/@x"
        );
    }
}
