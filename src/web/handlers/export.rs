use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{error, info};

use crate::{
    analytics::export::{export_filename, render_csv, ExportChannel},
    database::Database,
    errors::AppResult,
    web::AppState,
};

/// Download every channel with its latest videos as CSV
pub async fn export_csv(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let limit = state.settings.get().await.max_videos_per_channel;
    let channels = load_export(&state.database, limit).await.map_err(|e| {
        error!("Failed to export analytics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let body = render_csv(&channels, limit);
    let filename = export_filename(Utc::now());
    info!(channels = channels.len(), file = %filename, "Analytics exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

async fn load_export(database: &Database, limit: u32) -> AppResult<Vec<ExportChannel>> {
    let mut channels = Vec::new();
    for channel in database.list_channels().await? {
        let aggregates = database.get_channel_aggregates(channel.id).await?;
        let videos = database.list_videos(channel.id, Some(limit)).await?;
        channels.push(ExportChannel {
            channel,
            aggregates,
            videos,
        });
    }
    Ok(channels)
}
