use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::web::AppState;

/// Liveness plus a trivial database round trip
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match sqlx::query("SELECT 1").execute(&state.database.pool()).await {
        Ok(_) => Ok(Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "refresh_job_active": state.refresh.jobs().active_job_id().await.is_some(),
        }))),
        Err(e) => {
            error!("Health check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
