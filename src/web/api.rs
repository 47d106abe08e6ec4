//! JSON API handlers under `/api/v1`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    analytics::ChannelAggregates,
    config::AppSettings,
    models::{Channel, RefreshAllRequest, RefreshAllResponse, RefreshJobSnapshot, Video},
    web::{responses::refresh_status, AppState},
};

#[derive(Debug, Serialize)]
pub struct ChannelSummary {
    #[serde(flatten)]
    pub channel: Channel,
    pub aggregates: ChannelAggregates,
}

#[derive(Debug, Serialize)]
pub struct ChannelDetail {
    #[serde(flatten)]
    pub channel: Channel,
    pub aggregates: ChannelAggregates,
    pub videos: Vec<Video>,
}

/// List tracked channels with their current aggregates
pub async fn list_channels(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChannelSummary>>, StatusCode> {
    let channels = state.database.list_channels().await.map_err(|e| {
        error!("Failed to list channels: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut summaries = Vec::with_capacity(channels.len());
    for channel in channels {
        let aggregates = state
            .database
            .get_channel_aggregates(channel.id)
            .await
            .map_err(|e| {
                error!("Failed to aggregate channel {}: {}", channel.id, e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
        summaries.push(ChannelSummary {
            channel,
            aggregates,
        });
    }

    Ok(Json(summaries))
}

/// One channel with aggregates and its stored videos, newest first
pub async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ChannelDetail>, StatusCode> {
    let channel = match state.database.get_channel(id).await {
        Ok(Some(channel)) => channel,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to get channel {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let aggregates = state.database.get_channel_aggregates(id).await;
    let videos = state.database.list_videos(id, None).await;
    match (aggregates, videos) {
        (Ok(aggregates), Ok(videos)) => Ok(Json(ChannelDetail {
            channel,
            aggregates,
            videos,
        })),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to load videos of channel {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Start a refresh-all job, or report the one already running
pub async fn refresh_all(
    State(state): State<AppState>,
    Json(request): Json<RefreshAllRequest>,
) -> Json<RefreshAllResponse> {
    let start = state.refresh.start_refresh_all(request.force).await;
    info!(job_id = %start.job_id(), already_running = start.already_running(), "Refresh-all requested");
    Json(RefreshAllResponse {
        job_id: start.job_id(),
        already_running: start.already_running(),
    })
}

/// Latest job, finished or not
pub async fn current_job(
    State(state): State<AppState>,
) -> Result<Json<RefreshJobSnapshot>, StatusCode> {
    state
        .refresh
        .current()
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<RefreshJobSnapshot>, StatusCode> {
    state
        .refresh
        .status(job_id)
        .await
        .map(Json)
        .map_err(|e| refresh_status(&e))
}

/// Request a cooperative stop of a running job
pub async fn stop_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<RefreshJobSnapshot>, StatusCode> {
    state
        .refresh
        .stop(job_id)
        .await
        .map(Json)
        .map_err(|e| refresh_status(&e))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<AppSettings> {
    Json(state.settings.get().await)
}
