//! Dashboard form endpoints
//!
//! Every handler answers with a redirect back to the dashboard carrying a
//! flash `msg` or `error` query parameter.

use axum::{
    extract::{Path, State},
    response::Redirect,
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    config::SettingsUpdate,
    errors::{AppError, RefreshError},
    web::{
        responses::{redirect_with_error, redirect_with_message, safe_section},
        AppState,
    },
};

#[derive(Debug, Deserialize)]
pub struct AddChannelForm {
    pub url: String,
    pub next_section: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshChannelForm {
    pub force: Option<String>,
    pub next_section: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SectionForm {
    pub next_section: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub refresh_interval_hours: Option<String>,
    pub max_videos_per_channel: Option<String>,
    pub cookies_file: Option<String>,
}

fn flash_text(error: &AppError) -> String {
    match error {
        AppError::Validation { message } => message.clone(),
        AppError::Refresh(RefreshError::AlreadyRunning { .. }) => {
            "A refresh job is running, try again when it has finished".to_string()
        }
        other => other.to_string(),
    }
}

fn is_checked(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("1") | Some("true") | Some("on") | Some("yes")
    )
}

pub async fn add_channel(State(state): State<AppState>, Form(form): Form<AddChannelForm>) -> Redirect {
    let section = safe_section(form.next_section.as_deref());

    match state.refresh.add_channel(&form.url).await {
        Ok((channel, outcome)) if outcome.is_failed() => {
            redirect_with_error(section, &format!("Added '{}', but {}", channel.title, outcome.summary()))
        }
        Ok((channel, _)) => {
            info!(channel_id = channel.id, url = %channel.url, "Channel added");
            redirect_with_message(section, &format!("Added '{}'", channel.title))
        }
        Err(e) => {
            warn!("Failed to add channel {}: {}", form.url, e);
            redirect_with_error(section, &flash_text(&e))
        }
    }
}

pub async fn refresh_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<RefreshChannelForm>,
) -> Redirect {
    let section = safe_section(form.next_section.as_deref());
    let force = is_checked(form.force.as_deref());

    match state.refresh.refresh_one(id, force).await {
        Ok(outcome) if outcome.is_failed() => redirect_with_error(section, &outcome.summary()),
        Ok(outcome) => redirect_with_message(section, &outcome.summary()),
        Err(e) => redirect_with_error(section, &flash_text(&AppError::from(e))),
    }
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<SectionForm>,
) -> Redirect {
    let section = safe_section(form.next_section.as_deref());

    match state.refresh.delete_channel(id).await {
        Ok(true) => {
            state.avatars.remove_cached(id).await;
            redirect_with_message(section, "Channel deleted")
        }
        Ok(false) => redirect_with_error(section, "Channel not found"),
        Err(e) => {
            warn!(channel_id = id, "Failed to delete channel: {}", e);
            redirect_with_error(section, &flash_text(&e))
        }
    }
}

pub async fn update_settings(
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Redirect {
    let section = "settings";

    let update = match parse_settings(form) {
        Ok(update) => update,
        Err(e) => return redirect_with_error(section, &flash_text(&e)),
    };

    match state.settings.update(update).await {
        Ok(settings) => redirect_with_message(
            section,
            &format!(
                "Settings saved: refresh every {}h, {} videos per channel",
                settings.refresh_interval_hours, settings.max_videos_per_channel
            ),
        ),
        Err(e) => redirect_with_error(section, &flash_text(&e)),
    }
}

fn parse_settings(form: SettingsForm) -> Result<SettingsUpdate, AppError> {
    Ok(SettingsUpdate {
        refresh_interval_hours: parse_number("Refresh interval", form.refresh_interval_hours)?,
        max_videos_per_channel: parse_number("Videos per channel", form.max_videos_per_channel)?,
        cookies_file: form.cookies_file,
    })
}

fn parse_number(label: &str, raw: Option<String>) -> Result<Option<i64>, AppError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::validation(format!("{} must be a whole number", label))),
    }
}
