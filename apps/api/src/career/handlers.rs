use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::access::Capability;
use crate::career::{record_career_action, RecordActionRequest, RecordedAction};
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/workers/:id/career-actions
pub async fn handle_record_action(
    State(state): State<AppState>,
    capability: Capability,
    Path(worker_id): Path<Uuid>,
    Json(req): Json<RecordActionRequest>,
) -> Result<(StatusCode, Json<RecordedAction>), AppError> {
    let recorded = record_career_action(
        state.store.as_ref(),
        state.config.unresolved_pay_policy,
        capability,
        worker_id,
        &req,
        Utc::now().date_naive(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
