//! Channel level aggregate metrics
//!
//! Aggregates are always recomputed from the stored videos of a channel;
//! videos without a known view count do not contribute to the view
//! statistics.

use serde::{Deserialize, Serialize};

use crate::models::VideoCounts;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelAggregates {
    pub video_count: i64,
    pub total_views: i64,
    pub avg_views: i64,
    pub median_views: i64,
    pub top_video_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
}

/// Change of every aggregate across one refresh pass (`after - before`)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateDelta {
    pub total_views: i64,
    pub avg_views: i64,
    pub median_views: i64,
    pub top_video_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
}

impl ChannelAggregates {
    pub fn from_counts(counts: &[VideoCounts]) -> Self {
        let mut views: Vec<i64> = counts.iter().filter_map(|c| c.view_count).collect();
        views.sort_unstable();

        let total_views: i64 = views.iter().sum();
        let (avg_views, median_views, top_video_views) = view_stats(&views);

        Self {
            video_count: counts.len() as i64,
            total_views,
            avg_views,
            median_views,
            top_video_views,
            total_likes: counts.iter().filter_map(|c| c.like_count).sum(),
            total_comments: counts.iter().filter_map(|c| c.comment_count).sum(),
        }
    }

    pub fn delta_since(&self, before: &ChannelAggregates) -> AggregateDelta {
        AggregateDelta {
            total_views: self.total_views - before.total_views,
            avg_views: self.avg_views - before.avg_views,
            median_views: self.median_views - before.median_views,
            top_video_views: self.top_video_views - before.top_video_views,
            total_likes: self.total_likes - before.total_likes,
            total_comments: self.total_comments - before.total_comments,
        }
    }
}

/// Average, median and maximum of an ascending slice of view counts
fn view_stats(sorted: &[i64]) -> (i64, i64, i64) {
    let count = sorted.len();
    if count == 0 {
        return (0, 0, 0);
    }

    let sum: i64 = sorted.iter().sum();
    let avg = sum / count as i64;
    let median = if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2
    };

    (avg, median, sorted[count - 1])
}
