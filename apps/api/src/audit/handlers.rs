use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::access::{Capability, Operation};
use crate::audit::AuditFlagView;
use crate::errors::AppError;
use crate::state::AppState;

/// GET /api/v1/workers/:id/audit-flag
/// Returns the persisted flag; nothing is re-evaluated on read.
pub async fn handle_get_flag(
    State(state): State<AppState>,
    capability: Capability,
    Path(worker_id): Path<Uuid>,
) -> Result<Json<AuditFlagView>, AppError> {
    capability.require(Operation::ReadAuditFlag)?;
    let view = state
        .store
        .audit_flag(worker_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Worker {worker_id} not found")))?;
    Ok(Json(view))
}
