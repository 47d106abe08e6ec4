//! Extraction adapters
//!
//! An adapter turns a channel reference into the channel metadata and its most
//! recent videos. The refresh orchestration only depends on the
//! [`VideoExtractor`] trait; [`ytdlp::YtDlpExtractor`] is the production
//! implementation.

use async_trait::async_trait;

use crate::errors::ExtractionError;
use crate::models::{ChannelPayload, Platform};

pub mod cookies;
pub mod ytdlp;

pub use ytdlp::YtDlpExtractor;

/// Parameters of one channel fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub platform: Platform,
    pub channel_url: String,
    /// Maximum number of most recent videos to return
    pub limit: u32,
    pub cookies_file: Option<String>,
}

#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Fetch channel metadata and up to `request.limit` most recent videos
    ///
    /// An empty result is reported as a failure with kind `EmptyResult`.
    async fn fetch_recent_videos(
        &self,
        request: &FetchRequest,
    ) -> Result<ChannelPayload, ExtractionError>;
}
