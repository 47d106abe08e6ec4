use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored video with its latest engagement counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: i64,
    pub channel_id: i64,
    pub platform_video_id: String,
    pub title: String,
    pub url: String,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub thumbnail_url: Option<String>,
    /// Count changes observed by the latest refresh that saw this video
    pub view_delta: Option<i64>,
    pub like_delta: Option<i64>,
    pub comment_delta: Option<i64>,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Video {
    pub fn delta(&self) -> VideoDelta {
        VideoDelta {
            views: self.view_delta,
            likes: self.like_delta,
            comments: self.comment_delta,
        }
    }
}

/// One video as reported by the extraction adapter
///
/// Optional counts are absent when the platform listing omits them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    pub platform_video_id: String,
    pub title: String,
    pub url: String,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub thumbnail_url: Option<String>,
}

/// Engagement counts of one stored video, the input of aggregate computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoCounts {
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
}

impl From<&VideoRecord> for VideoCounts {
    fn from(record: &VideoRecord) -> Self {
        Self {
            view_count: record.view_count,
            like_count: record.like_count,
            comment_count: record.comment_count,
        }
    }
}

impl From<&Video> for VideoCounts {
    fn from(video: &Video) -> Self {
        Self {
            view_count: video.view_count,
            like_count: video.like_count,
            comment_count: video.comment_count,
        }
    }
}

/// Change of one video's counts between two refreshes
///
/// A count that is stored for the first time starts at a zero delta; a count
/// the platform never reported stays `None`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoDelta {
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
}

impl VideoDelta {
    /// Delta of writing `incoming` over `stored`
    ///
    /// Missing incoming counts keep the stored value, so they count as no change.
    pub fn between(stored: &VideoCounts, incoming: &VideoCounts) -> Self {
        Self {
            views: count_delta(stored.view_count, incoming.view_count),
            likes: count_delta(stored.like_count, incoming.like_count),
            comments: count_delta(stored.comment_count, incoming.comment_count),
        }
    }

    pub fn is_zero(&self) -> bool {
        [self.views, self.likes, self.comments]
            .iter()
            .all(|d| d.unwrap_or(0) == 0)
    }
}

fn count_delta(stored: Option<i64>, incoming: Option<i64>) -> Option<i64> {
    match (stored, incoming.or(stored)) {
        (Some(old), Some(new)) => Some(new - old),
        (None, Some(_)) => Some(0),
        (_, None) => None,
    }
}

/// A stored video whose counts moved during a refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoChange {
    pub platform_video_id: String,
    pub title: String,
    #[serde(flatten)]
    pub delta: VideoDelta,
}

/// Per-day record of channel totals used for 24h deltas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSnapshot {
    pub id: i64,
    pub channel_id: i64,
    pub captured_at: DateTime<Utc>,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub subscriber_count: Option<i64>,
}

/// Sort keys accepted by the dashboard video tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoSort {
    #[default]
    UploadDate,
    Views,
    Likes,
    Comments,
    Title,
}

impl VideoSort {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or_default() {
            "views" => VideoSort::Views,
            "likes" => VideoSort::Likes,
            "comments" => VideoSort::Comments,
            "title" => VideoSort::Title,
            _ => VideoSort::UploadDate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoSort::UploadDate => "upload_date",
            VideoSort::Views => "views",
            VideoSort::Likes => "likes",
            VideoSort::Comments => "comments",
            VideoSort::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or_default() {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}
