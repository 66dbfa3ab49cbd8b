use axum::{extract::State, Json};
use engine::SiteStatus;

use super::AppState;
use crate::ApiError;

pub async fn current(State(state): State<AppState>) -> Result<Json<SiteStatus>, ApiError> {
    Ok(Json(state.reconciler.current_status().await?))
}

pub async fn health() -> &'static str {
    "ok"
}
