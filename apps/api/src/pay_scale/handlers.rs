use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::access::Capability;
use crate::errors::AppError;
use crate::pay_scale::import::{import_salary_structure, ImportStructureRequest, ImportStructureResponse};
use crate::pay_scale::{resolve_salary, PayQuery, ResolvedPay};
use crate::state::AppState;

/// GET /api/v1/pay-scales/resolve
pub async fn handle_resolve(
    State(state): State<AppState>,
    capability: Capability,
    Query(query): Query<PayQuery>,
) -> Result<Json<ResolvedPay>, AppError> {
    let pay = resolve_salary(state.store.as_ref(), capability, &query).await?;
    Ok(Json(pay))
}

/// POST /api/v1/pay-scales
pub async fn handle_import(
    State(state): State<AppState>,
    capability: Capability,
    Json(req): Json<ImportStructureRequest>,
) -> Result<(StatusCode, Json<ImportStructureResponse>), AppError> {
    let response = import_salary_structure(state.store.as_ref(), capability, &req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
