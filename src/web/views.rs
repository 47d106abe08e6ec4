//! Dashboard view models and templates
//!
//! Everything a template prints is pre-formatted here so the templates only
//! loop and branch. Absent values render as an em dash.

use askama::Template;

use crate::{
    analytics::{ChannelReport, ChartRow, PlatformGroup},
    config::AppSettings,
    models::{SortOrder, Video, VideoSort},
    utils::{format_count, format_delta, DateTimeParser},
};

pub const MISSING: &str = "\u{2014}";

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub section: String,
    pub flash_message: String,
    pub flash_error: String,
    pub channel_count: usize,
    pub total_views: String,
    pub groups: Vec<GroupView>,
    pub views_chart: Vec<ChartView>,
    pub avg_chart: Vec<ChartView>,
    pub sort_options: Vec<SelectOption>,
    pub order_options: Vec<SelectOption>,
    pub settings: SettingsView,
}

pub struct GroupView {
    pub label: String,
    pub channel_count: usize,
    pub total_views: String,
    pub total_likes: String,
    pub total_comments: String,
    pub channels: Vec<ChannelCard>,
}

pub struct ChannelCard {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub platform_label: String,
    pub avatar_url: String,
    pub subscribers: String,
    pub video_count: i64,
    pub total_views: String,
    pub avg_views: String,
    pub median_views: String,
    pub top_video_views: String,
    pub total_likes: String,
    pub total_comments: String,
    pub last_refreshed: String,
    pub last_error: String,
    pub has_day_delta: bool,
    pub delta_views: String,
    pub delta_likes: String,
    pub delta_comments: String,
    pub delta_subscribers: String,
    pub videos: Vec<VideoRow>,
}

pub struct VideoRow {
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    pub published: String,
    pub views: String,
    pub likes: String,
    pub comments: String,
    /// Changes since the previous refresh, empty when nothing moved
    pub views_change: String,
    pub likes_change: String,
    pub comments_change: String,
    pub duration: String,
}

pub struct ChartView {
    pub title: String,
    pub value: String,
    pub percent: u32,
}

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub struct SettingsView {
    pub refresh_interval_hours: u32,
    pub max_videos_per_channel: u32,
    pub cookies_file: String,
}

fn change_or_blank(delta: Option<i64>) -> String {
    match delta {
        Some(d) if d != 0 => format_delta(d),
        _ => String::new(),
    }
}

fn count_or_missing(value: Option<i64>) -> String {
    value.map(format_count).unwrap_or_else(|| MISSING.to_string())
}

/// `m:ss`, or `h:mm:ss` for long videos
pub fn format_duration(seconds: Option<i64>) -> String {
    match seconds {
        Some(total) if total >= 0 => {
            let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
            if hours > 0 {
                format!("{}:{:02}:{:02}", hours, minutes, secs)
            } else {
                format!("{}:{:02}", minutes, secs)
            }
        }
        _ => MISSING.to_string(),
    }
}

impl From<&Video> for VideoRow {
    fn from(video: &Video) -> Self {
        Self {
            title: video.title.clone(),
            url: video.url.clone(),
            thumbnail_url: video.thumbnail_url.clone().unwrap_or_default(),
            published: video
                .published_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| MISSING.to_string()),
            views: count_or_missing(video.view_count),
            likes: count_or_missing(video.like_count),
            comments: count_or_missing(video.comment_count),
            views_change: change_or_blank(video.view_delta),
            likes_change: change_or_blank(video.like_delta),
            comments_change: change_or_blank(video.comment_delta),
            duration: format_duration(video.duration_seconds),
        }
    }
}

impl From<&ChannelReport> for ChannelCard {
    fn from(report: &ChannelReport) -> Self {
        let channel = &report.channel;
        let aggregates = &report.aggregates;
        let day = report.day_delta;

        Self {
            id: channel.id,
            title: report.display_title.clone(),
            url: channel.url.clone(),
            platform_label: channel.platform.label().to_string(),
            avatar_url: channel.avatar_url.clone().unwrap_or_default(),
            subscribers: count_or_missing(channel.subscriber_count),
            video_count: aggregates.video_count,
            total_views: format_count(aggregates.total_views),
            avg_views: format_count(aggregates.avg_views),
            median_views: format_count(aggregates.median_views),
            top_video_views: format_count(aggregates.top_video_views),
            total_likes: format_count(aggregates.total_likes),
            total_comments: format_count(aggregates.total_comments),
            last_refreshed: channel
                .last_refreshed_at
                .map(|at| DateTimeParser::format_for_display(&at))
                .unwrap_or_else(|| "never".to_string()),
            last_error: channel.last_error.clone().unwrap_or_default(),
            has_day_delta: day.is_some(),
            delta_views: day.map(|d| format_delta(d.views)).unwrap_or_default(),
            delta_likes: day.map(|d| format_delta(d.likes)).unwrap_or_default(),
            delta_comments: day.map(|d| format_delta(d.comments)).unwrap_or_default(),
            delta_subscribers: day
                .and_then(|d| d.subscribers)
                .map(format_delta)
                .unwrap_or_else(|| MISSING.to_string()),
            videos: report.videos.iter().map(VideoRow::from).collect(),
        }
    }
}

impl From<&PlatformGroup> for GroupView {
    fn from(group: &PlatformGroup) -> Self {
        Self {
            label: group.platform.label().to_string(),
            channel_count: group.channels.len(),
            total_views: format_count(group.total_views),
            total_likes: format_count(group.total_likes),
            total_comments: format_count(group.total_comments),
            channels: group.channels.iter().map(ChannelCard::from).collect(),
        }
    }
}

impl From<&ChartRow> for ChartView {
    fn from(row: &ChartRow) -> Self {
        Self {
            title: row.title.clone(),
            value: format_count(row.value),
            percent: row.percent,
        }
    }
}

impl From<&AppSettings> for SettingsView {
    fn from(settings: &AppSettings) -> Self {
        Self {
            refresh_interval_hours: settings.refresh_interval_hours,
            max_videos_per_channel: settings.max_videos_per_channel,
            cookies_file: settings.cookies_file.clone().unwrap_or_default(),
        }
    }
}

pub fn sort_options(selected: VideoSort) -> Vec<SelectOption> {
    [
        (VideoSort::UploadDate, "Upload date"),
        (VideoSort::Views, "Views"),
        (VideoSort::Likes, "Likes"),
        (VideoSort::Comments, "Comments"),
        (VideoSort::Title, "Title"),
    ]
    .into_iter()
    .map(|(sort, label)| SelectOption {
        value: sort.as_str().to_string(),
        label: label.to_string(),
        selected: sort == selected,
    })
    .collect()
}

pub fn order_options(selected: SortOrder) -> Vec<SelectOption> {
    [(SortOrder::Desc, "Descending"), (SortOrder::Asc, "Ascending")]
        .into_iter()
        .map(|(order, label)| SelectOption {
            value: order.as_str().to_string(),
            label: label.to_string(),
            selected: order == selected,
        })
        .collect()
}
