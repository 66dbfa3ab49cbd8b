use axum::{extract::State, Json};
use engine::{RunReport, TriggerPayload, WorkflowInput};
use tracing::warn;

use super::AppState;
use crate::ApiError;

/// Run the reconciler once for the posted payload and wait for it to end.
pub async fn start(
    State(state): State<AppState>,
    Json(payload): Json<TriggerPayload>,
) -> Result<Json<RunReport>, ApiError> {
    let input = WorkflowInput::try_from(payload)?;
    match state.reconciler.run(&input).await {
        Ok(report) => Ok(Json(report)),
        Err(err) => {
            warn!("run for {} failed: {}", input.stack_label, err);
            Err(err.into())
        }
    }
}
