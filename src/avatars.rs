//! Local cache of channel avatars
//!
//! Platform avatar URLs are signed and expire, so a copy is stored under the
//! avatar directory and served from `/avatars/<file>`.

use anyhow::{anyhow, bail, Result};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// URL prefix the web layer serves cached avatars from
pub const AVATAR_ROUTE_PREFIX: &str = "/avatars/";

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct AvatarCache {
    avatar_dir: PathBuf,
    client: reqwest::Client,
}

impl AvatarCache {
    pub fn new(avatar_dir: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("reelstats/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { avatar_dir, client }
    }

    pub fn avatar_dir(&self) -> &Path {
        &self.avatar_dir
    }

    /// Whether an avatar reference already points at the local cache
    pub fn is_cached_reference(avatar_url: &str) -> bool {
        avatar_url.starts_with(AVATAR_ROUTE_PREFIX)
    }

    /// Download `remote_url` and store it as `channel_<id>.<ext>`
    ///
    /// Returns the local reference to store on the channel.
    pub async fn cache_avatar(&self, channel_id: i64, remote_url: &str) -> Result<String> {
        let response = self.client.get(remote_url).send().await?;
        if !response.status().is_success() {
            bail!("avatar download failed: HTTP {}", response.status());
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_AVATAR_BYTES {
            bail!("avatar too large ({} bytes)", bytes.len());
        }

        let extension = image_extension(&bytes)?;
        fs::create_dir_all(&self.avatar_dir).await?;

        self.remove_cached(channel_id).await;
        let file_name = format!("channel_{}.{}", channel_id, extension);
        fs::write(self.avatar_dir.join(&file_name), &bytes).await?;

        debug!(channel_id, file = %file_name, "Cached avatar");
        Ok(format!("{}{}", AVATAR_ROUTE_PREFIX, file_name))
    }

    /// Remove every cached avatar of a channel
    pub async fn remove_cached(&self, channel_id: i64) {
        for extension in ["png", "jpg", "gif", "webp"] {
            let path = self
                .avatar_dir
                .join(format!("channel_{}.{}", channel_id, extension));
            let _ = fs::remove_file(path).await;
        }
    }

    /// Read a cached file; names containing path components are rejected
    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        if !is_safe_file_name(file_name) {
            bail!("invalid avatar file name");
        }
        Ok(fs::read(self.avatar_dir.join(file_name)).await?)
    }
}

fn is_safe_file_name(file_name: &str) -> bool {
    !file_name.is_empty()
        && !file_name.starts_with('.')
        && file_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

fn image_extension(data: &[u8]) -> Result<&'static str> {
    let format = image::guess_format(data).map_err(|e| anyhow!("not an image: {}", e))?;
    match format {
        ImageFormat::Png => Ok("png"),
        ImageFormat::Jpeg => Ok("jpg"),
        ImageFormat::Gif => Ok("gif"),
        ImageFormat::WebP => Ok("webp"),
        other => Err(anyhow!("unsupported avatar format {:?}", other)),
    }
}
