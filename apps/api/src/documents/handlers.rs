use axum::{
    extract::{Path, Query, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::access::{Capability, Operation};
use crate::documents::{confirm_document, ConfirmDocumentRequest, DocumentType, ExtractionResult, ReconciledDocument};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ExtractQuery {
    pub document_type: DocumentType,
}

/// POST /api/v1/documents/:id/confirm
pub async fn handle_confirm(
    State(state): State<AppState>,
    capability: Capability,
    Path(document_id): Path<Uuid>,
    Json(req): Json<ConfirmDocumentRequest>,
) -> Result<Json<ReconciledDocument>, AppError> {
    let review = confirm_document(
        state.store.as_ref(),
        capability,
        document_id,
        &req,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(review))
}

/// POST /api/v1/documents/:id/extract
/// Forwards raw bytes to the extraction service. Persists nothing.
pub async fn handle_extract(
    State(state): State<AppState>,
    capability: Capability,
    Path(document_id): Path<Uuid>,
    Query(params): Query<ExtractQuery>,
    body: Bytes,
) -> Result<Json<ExtractionResult>, AppError> {
    capability.require(Operation::ExtractDocument)?;
    let client = state.extraction.as_ref().ok_or(AppError::NotImplemented)?;
    if body.is_empty() {
        return Err(AppError::InconsistentInput("document body is empty".to_string()));
    }

    let size = body.len();
    let result = client.extract(params.document_type, body).await?;
    info!(
        %document_id,
        document_type = %params.document_type,
        bytes = size,
        confidence = result.confidence,
        "document extracted"
    );
    Ok(Json(result))
}
