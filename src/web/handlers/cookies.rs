//! Cookie file upload and inspection for the settings section

use axum::{
    extract::{Multipart, State},
    response::Redirect,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::{
    config::SettingsUpdate,
    extractor::cookies::{inspect_cookie_file, inspect_cookies, CookieReport, COOKIE_FILE_NAME},
    web::{
        responses::{redirect_with_error, redirect_with_message},
        AppState,
    },
};

const SECTION: &str = "settings";

/// State of the configured cookie file
#[derive(Debug, Serialize)]
pub struct CookieStatus {
    pub configured: bool,
    pub path: Option<String>,
    pub usable: bool,
    pub report: Option<CookieReport>,
    pub message: String,
}

/// Store an uploaded Netscape cookie file and point the settings at it
pub async fn upload_cookies(State(state): State<AppState>, mut multipart: Multipart) -> Redirect {
    let mut upload = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("cookies_file") => match field.bytes().await {
                Ok(data) => upload = Some(data),
                Err(e) => return redirect_with_error(SECTION, &format!("Upload failed: {}", e)),
            },
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => return redirect_with_error(SECTION, &format!("Upload failed: {}", e)),
        }
    }

    let data = match upload.filter(|data| !data.is_empty()) {
        Some(data) => data,
        None => return redirect_with_error(SECTION, "Choose a cookie file to upload"),
    };
    let report = match inspect_cookies(&data, Utc::now()) {
        Ok(report) => report,
        Err(e) => return redirect_with_error(SECTION, &e.to_string()),
    };

    let path = state.config.storage.data_dir.join(COOKIE_FILE_NAME);
    if let Err(e) = write_cookie_file(&path, &data).await {
        warn!("Failed to store cookie file {}: {}", path.display(), e);
        return redirect_with_error(SECTION, "Could not store the cookie file");
    }

    let update = SettingsUpdate {
        cookies_file: Some(path.to_string_lossy().into_owned()),
        ..Default::default()
    };
    if let Err(e) = state.settings.update(update).await {
        return redirect_with_error(SECTION, &e.to_string());
    }

    info!(path = %path.display(), cookies = report.total, "Cookie file uploaded");
    if report.is_usable() {
        redirect_with_message(SECTION, &format!("Cookie file saved: {}", report.summary()))
    } else {
        redirect_with_error(
            SECTION,
            &format!("Cookie file saved, but every cookie has expired: {}", report.summary()),
        )
    }
}

async fn write_cookie_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await
}

/// Re-read the configured cookie file and flash the result
pub async fn check_cookies(State(state): State<AppState>) -> Redirect {
    let status = cookie_status_of(&state).await;
    if status.usable {
        redirect_with_message(SECTION, &status.message)
    } else {
        redirect_with_error(SECTION, &status.message)
    }
}

pub async fn cookie_status(State(state): State<AppState>) -> Json<CookieStatus> {
    Json(cookie_status_of(&state).await)
}

async fn cookie_status_of(state: &AppState) -> CookieStatus {
    let Some(path) = state.settings.get().await.cookies_file else {
        return CookieStatus {
            configured: false,
            path: None,
            usable: false,
            report: None,
            message: "No cookie file configured".to_string(),
        };
    };

    match inspect_cookie_file(Path::new(&path), Utc::now()).await {
        Ok(report) => {
            let usable = report.is_usable();
            let message = if usable {
                format!("Cookie file is valid: {}", report.summary())
            } else {
                format!("Every cookie has expired: {}", report.summary())
            };
            CookieStatus {
                configured: true,
                path: Some(path),
                usable,
                report: Some(report),
                message,
            }
        }
        Err(e) => CookieStatus {
            configured: true,
            path: Some(path),
            usable: false,
            report: None,
            message: e.to_string(),
        },
    }
}
