//! Server-rendered dashboard

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;

use crate::{
    analytics::dashboard::{
        chart_rows, day_delta, day_delta_threshold, display_title, group_by_platform, sort_videos,
    },
    analytics::ChannelReport,
    database::Database,
    errors::AppResult,
    models::{SortOrder, VideoSort},
    utils::format_count,
    web::{
        responses::safe_section,
        views::{self, ChartView, DashboardTemplate, GroupView, SettingsView},
        AppState,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub section: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub msg: Option<String>,
    pub error: Option<String>,
}

pub async fn index() -> Redirect {
    Redirect::to("/dashboard")
}

pub async fn dashboard_page(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, StatusCode> {
    let settings = state.settings.get().await;
    let sort = VideoSort::parse(query.sort.as_deref());
    let order = SortOrder::parse(query.order.as_deref());

    let reports = load_reports(
        &state.database,
        settings.max_videos_per_channel,
        sort,
        order,
        Utc::now(),
    )
    .await
    .map_err(|e| {
        error!("Failed to build dashboard: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let views_chart = chart_rows(&reports, |a| a.total_views);
    let avg_chart = chart_rows(&reports, |a| a.avg_views);
    let total_views: i64 = reports.iter().map(|r| r.aggregates.total_views).sum();
    let channel_count = reports.len();
    let groups = group_by_platform(reports);

    let template = DashboardTemplate {
        section: safe_section(query.section.as_deref()).to_string(),
        flash_message: query.msg.unwrap_or_default(),
        flash_error: query.error.unwrap_or_default(),
        channel_count,
        total_views: format_count(total_views),
        groups: groups.iter().map(GroupView::from).collect(),
        views_chart: views_chart.iter().map(ChartView::from).collect(),
        avg_chart: avg_chart.iter().map(ChartView::from).collect(),
        sort_options: views::sort_options(sort),
        order_options: views::order_options(order),
        settings: SettingsView::from(&settings),
    };

    template.render().map(Html).map_err(|e| {
        error!("Failed to render dashboard: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Per-channel reports in channel id order
pub async fn load_reports(
    database: &Database,
    video_limit: u32,
    sort: VideoSort,
    order: SortOrder,
    now: DateTime<Utc>,
) -> AppResult<Vec<ChannelReport>> {
    let threshold = day_delta_threshold(now);
    let channels = database.list_channels().await?;

    let mut reports = Vec::with_capacity(channels.len());
    for channel in channels {
        let aggregates = database.get_channel_aggregates(channel.id).await?;
        let mut videos = database.list_videos(channel.id, Some(video_limit)).await?;
        sort_videos(&mut videos, sort, order);
        let baseline = database.latest_snapshot_before(channel.id, threshold).await?;

        reports.push(ChannelReport {
            display_title: display_title(&channel),
            day_delta: day_delta(&aggregates, channel.subscriber_count, baseline.as_ref()),
            aggregates,
            videos,
            channel,
        });
    }

    Ok(reports)
}
