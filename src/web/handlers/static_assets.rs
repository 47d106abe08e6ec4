use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::{assets::StaticAssets, web::AppState};

pub async fn serve_static_asset(Path(path): Path<String>) -> Response {
    let asset_path = format!("static/{}", path);
    match StaticAssets::get_asset(&asset_path) {
        Some(asset) => (
            [
                (header::CONTENT_TYPE, StaticAssets::get_content_type(&asset_path)),
                (header::CACHE_CONTROL, "public, max-age=3600"),
            ],
            Body::from(asset.data.into_owned()),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Asset not found").into_response(),
    }
}

/// Serve a locally cached channel avatar
pub async fn serve_avatar(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    match state.avatars.read(&file).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, StaticAssets::get_content_type(&file)),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            Body::from(bytes),
        )
            .into_response(),
        Err(e) => {
            debug!(file = %file, "Avatar not served: {}", e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
