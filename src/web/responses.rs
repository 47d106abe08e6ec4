//! Error to status mapping and flash redirects

use axum::{http::StatusCode, response::Redirect};

use crate::errors::{AppError, RefreshError, RepositoryError};

/// HTTP status for an application error
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Refresh(refresh) => refresh_status(refresh),
        AppError::Repository(RepositoryError::RecordNotFound { .. }) => StatusCode::NOT_FOUND,
        AppError::Repository(RepositoryError::ConstraintViolation { .. }) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// HTTP status for a refresh orchestration error
pub fn refresh_status(error: &RefreshError) -> StatusCode {
    match error {
        RefreshError::AlreadyRunning { .. } => StatusCode::CONFLICT,
        RefreshError::JobNotFound { .. } | RefreshError::ChannelNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        RefreshError::AdapterUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RefreshError::Store(_) | RefreshError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Dashboard sections a form may return to
pub const SECTIONS: [&str; 3] = ["overview", "charts", "settings"];

/// Known section name, falling back to the overview
pub fn safe_section(section: Option<&str>) -> &'static str {
    section
        .and_then(|s| SECTIONS.iter().copied().find(|known| *known == s))
        .unwrap_or("overview")
}

/// Redirect back to the dashboard with a success message
pub fn redirect_with_message(section: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "/dashboard?section={}&msg={}",
        section,
        urlencoding::encode(message)
    ))
}

/// Redirect back to the dashboard with an error message
pub fn redirect_with_error(section: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "/dashboard?section={}&error={}",
        section,
        urlencoding::encode(message)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AppError::validation("bad url")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AppError::not_found("channel", "7")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AppError::from(RefreshError::AlreadyRunning {
                job_id: Uuid::new_v4()
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            refresh_status(&RefreshError::AdapterUnavailable {
                message: "yt-dlp missing".into()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&AppError::internal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_safe_section() {
        assert_eq!(safe_section(Some("charts")), "charts");
        assert_eq!(safe_section(Some("../admin")), "overview");
        assert_eq!(safe_section(None), "overview");
    }
}
