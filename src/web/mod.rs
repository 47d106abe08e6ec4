//! Web layer
//!
//! Serves the server-rendered dashboard, its form endpoints, the CSV export
//! and the JSON API under `/api/v1`. Handlers stay thin: they translate
//! requests into calls on [`RefreshService`] and the database, and map
//! failures to status codes through [`responses`].

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    avatars::AvatarCache, config::Config, config::RuntimeSettingsStore, database::Database,
    refresh::RefreshService,
};

pub mod api;
pub mod handlers;
pub mod responses;
pub mod views;

pub use responses::status_for;

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let app = create_router(state);
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self { app, addr })
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Listening on http://{}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Build the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        // Dashboard and its forms
        .route("/", get(handlers::dashboard::index))
        .route("/dashboard", get(handlers::dashboard::dashboard_page))
        .route("/channels", post(handlers::forms::add_channel))
        .route("/channels/:id/refresh", post(handlers::forms::refresh_channel))
        .route("/channels/:id/delete", post(handlers::forms::delete_channel))
        .route("/settings", post(handlers::forms::update_settings))
        .route("/settings/cookies/upload", post(handlers::cookies::upload_cookies))
        .route("/settings/cookies/check", post(handlers::cookies::check_cookies))
        .route("/settings/cookies/status", get(handlers::cookies::cookie_status))
        .route("/analytics/export.csv", get(handlers::export::export_csv))
        // Assets
        .route("/static/*path", get(handlers::static_assets::serve_static_asset))
        .route("/avatars/:file", get(handlers::static_assets::serve_avatar))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/channels", get(api::list_channels))
        .route("/channels/:id", get(api::get_channel))
        .route("/refresh-all", post(api::refresh_all))
        .route("/jobs/current", get(api::current_job))
        .route("/jobs/:id", get(api::job_status))
        .route("/jobs/:id/stop", post(api::stop_job))
        .route("/settings", get(api::get_settings))
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub refresh: RefreshService,
    pub settings: RuntimeSettingsStore,
    pub avatars: AvatarCache,
    pub config: Config,
}
