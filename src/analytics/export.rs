//! CSV export of channel aggregates and their latest videos

use chrono::{DateTime, Utc};

use super::ChannelAggregates;
use crate::models::{Channel, Video};

const BOM: &str = "\u{feff}";

const HEADER: [&str; 18] = [
    "channel_id",
    "channel_title",
    "channel_url",
    "platform",
    "export_video_limit",
    "video_rank_in_channel",
    "last_refreshed_at",
    "channel_last_error",
    "total_views",
    "average_views",
    "median_views",
    "top_video_views",
    "video_title",
    "video_url",
    "video_upload_date",
    "video_views",
    "video_likes",
    "video_comments",
];

/// One channel with the videos to export, newest first
#[derive(Debug, Clone)]
pub struct ExportChannel {
    pub channel: Channel,
    pub aggregates: ChannelAggregates,
    pub videos: Vec<Video>,
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("reelstats_export_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Render the export document
///
/// Channels without videos still produce one row with empty video cells.
pub fn render_csv(channels: &[ExportChannel], video_limit: u32) -> String {
    let mut out = String::from(BOM);
    push_row(&mut out, HEADER.iter().map(|h| h.to_string()));

    for entry in channels {
        let channel = &entry.channel;
        let agg = &entry.aggregates;
        let channel_cells = |rank: String| {
            vec![
                channel.id.to_string(),
                channel.title.clone(),
                channel.url.clone(),
                channel.platform.as_str().to_string(),
                video_limit.to_string(),
                rank,
                channel
                    .last_refreshed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                channel.last_error.clone().unwrap_or_default(),
                agg.total_views.to_string(),
                agg.avg_views.to_string(),
                agg.median_views.to_string(),
                agg.top_video_views.to_string(),
            ]
        };

        if entry.videos.is_empty() {
            let mut cells = channel_cells(String::new());
            cells.extend(std::iter::repeat(String::new()).take(6));
            push_row(&mut out, cells);
            continue;
        }

        for (idx, video) in entry.videos.iter().take(video_limit as usize).enumerate() {
            let mut cells = channel_cells((idx + 1).to_string());
            cells.push(video.title.clone());
            cells.push(video.url.clone());
            cells.push(video.published_at.map(|t| t.to_rfc3339()).unwrap_or_default());
            cells.push(optional(video.view_count));
            cells.push(optional(video.like_count));
            cells.push(optional(video.comment_count));
            push_row(&mut out, cells);
        }
    }

    out
}

fn optional(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn push_row<I>(out: &mut String, cells: I)
where
    I: IntoIterator<Item = String>,
{
    let escaped: Vec<String> = cells.into_iter().map(|c| escape_cell(&c)).collect();
    out.push_str(&escaped.join(","));
    out.push_str("\r\n");
}

fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
