//! Dashboard view preparation
//!
//! Pure functions turning stored channels, videos and snapshots into the rows
//! rendered by the dashboard and charts.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::OnceLock;

use super::ChannelAggregates;
use crate::models::{Channel, ChannelSnapshot, Platform, SortOrder, Video, VideoSort};

/// Age a snapshot must have to serve as the 24h baseline
pub const DAY_DELTA_WINDOW_HOURS: i64 = 24;

/// Change of channel totals against the newest snapshot at least a day old
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DayDelta {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub subscribers: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: Channel,
    pub display_title: String,
    pub aggregates: ChannelAggregates,
    pub videos: Vec<Video>,
    pub day_delta: Option<DayDelta>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformGroup {
    pub platform: Platform,
    pub channels: Vec<ChannelReport>,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartRow {
    pub channel_id: i64,
    pub title: String,
    pub value: i64,
    /// Bar width relative to the largest value, 0..=100
    pub percent: u32,
}

fn handle_like() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9._]+$").expect("static regex"))
}

fn shorts_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\s*[-|•:/]\s*shorts?\s*|\s*\(\s*shorts?\s*\)\s*)$").expect("static regex")
    })
}

/// Human friendly channel title
///
/// TikTok frequently reports the account handle as the title; handle-like
/// titles are turned into capitalised words.
pub fn display_title(channel: &Channel) -> String {
    let raw = channel.title.trim();
    if raw.is_empty() {
        return "Untitled channel".to_string();
    }
    if channel.platform != Platform::TikTok {
        return strip_shorts_suffix(raw);
    }

    let normalized = raw.strip_prefix('@').unwrap_or(raw);
    if handle_like().is_match(normalized) {
        let words: Vec<String> = normalized
            .split(['.', '_'])
            .filter(|part| !part.is_empty())
            .map(capitalize)
            .collect();
        if !words.is_empty() {
            return words.join(" ");
        }
    }
    raw.to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Remove trailing "- Shorts" / "(Shorts)" decorations from a title
pub fn strip_shorts_suffix(title: &str) -> String {
    let cleaned = shorts_suffix().replace(title.trim(), "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        title.to_string()
    } else {
        cleaned
    }
}

/// Sort videos in place; videos missing the sort value always go last
pub fn sort_videos(videos: &mut [Video], sort: VideoSort, order: SortOrder) {
    fn by_optional<T: Ord>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => match order {
                SortOrder::Asc => a.cmp(&b),
                SortOrder::Desc => b.cmp(&a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    videos.sort_by(|a, b| match sort {
        VideoSort::Title => {
            let ord = a.title.to_lowercase().cmp(&b.title.to_lowercase());
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
        VideoSort::Views => by_optional(a.view_count, b.view_count, order),
        VideoSort::Likes => by_optional(a.like_count, b.like_count, order),
        VideoSort::Comments => by_optional(a.comment_count, b.comment_count, order),
        VideoSort::UploadDate => by_optional(a.published_at, b.published_at, order),
    });
}

/// Delta of the current totals against the baseline snapshot
pub fn day_delta(
    aggregates: &ChannelAggregates,
    subscriber_count: Option<i64>,
    baseline: Option<&ChannelSnapshot>,
) -> Option<DayDelta> {
    let baseline = baseline?;
    let subscribers = match (subscriber_count, baseline.subscriber_count) {
        (Some(now), Some(then)) => Some(now - then),
        _ => None,
    };
    Some(DayDelta {
        views: aggregates.total_views - baseline.total_views,
        likes: aggregates.total_likes - baseline.total_likes,
        comments: aggregates.total_comments - baseline.total_comments,
        subscribers,
    })
}

/// Latest instant a snapshot may have been captured to be a 24h baseline
pub fn day_delta_threshold(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(DAY_DELTA_WINDOW_HOURS)
}

/// Group reports by platform in the fixed dashboard order
///
/// Channels inside a group are ordered by display title.
pub fn group_by_platform(reports: Vec<ChannelReport>) -> Vec<PlatformGroup> {
    let mut groups = Vec::new();
    let mut remaining = reports;

    for platform in Platform::ALL {
        let (mut members, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|report| report.channel.platform == platform);
        remaining = rest;
        if members.is_empty() {
            continue;
        }
        members.sort_by_key(|report| report.display_title.to_lowercase());

        groups.push(PlatformGroup {
            platform,
            total_views: members.iter().map(|r| r.aggregates.total_views).sum(),
            total_likes: members.iter().map(|r| r.aggregates.total_likes).sum(),
            total_comments: members.iter().map(|r| r.aggregates.total_comments).sum(),
            channels: members,
        });
    }

    groups
}

/// Chart rows for one metric, largest first
pub fn chart_rows<F>(reports: &[ChannelReport], metric: F) -> Vec<ChartRow>
where
    F: Fn(&ChannelAggregates) -> i64,
{
    let max = reports
        .iter()
        .map(|r| metric(&r.aggregates))
        .max()
        .unwrap_or(0);

    let mut rows: Vec<ChartRow> = reports
        .iter()
        .map(|report| {
            let value = metric(&report.aggregates);
            let percent = if max > 0 {
                ((value.max(0) as f64 / max as f64) * 100.0).round() as u32
            } else {
                0
            };
            ChartRow {
                channel_id: report.channel.id,
                title: report.display_title.clone(),
                value,
                percent,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.value.cmp(&a.value));
    rows
}
