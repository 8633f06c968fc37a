//! `confirmDocument`: a reviewer's confirmation becomes the next review revision.
//!
//! Reviews are append-only. Confirming an already-reviewed document adds
//! revision n+1 marked as a correction; older revisions stay readable. The
//! owning worker's audit flag is re-evaluated in the same unit of work. A
//! document's type is fixed by its first confirmation.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{Capability, Operation};
use crate::audit::refresh_flag;
use crate::documents::reconcile::validate_extraction;
use crate::documents::{reconcile, DocumentType, ExtractionResult, HumanFields, ReconciledDocument};
use crate::errors::AppError;
use crate::store::EngineStore;

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmDocumentRequest {
    pub worker_id: Uuid,
    pub document_type: DocumentType,
    pub storage_ref: Option<String>,
    #[serde(default)]
    pub human_fields: HumanFields,
    pub extraction: ExtractionResult,
}

pub async fn confirm_document(
    store: &dyn EngineStore,
    capability: Capability,
    document_id: Uuid,
    request: &ConfirmDocumentRequest,
    today: NaiveDate,
) -> Result<ReconciledDocument, AppError> {
    capability.require(Operation::ConfirmDocument)?;
    validate_extraction(&request.extraction)?;

    if let Some(owner) = store.document_owner(document_id).await? {
        if owner != request.worker_id {
            warn!(%document_id, %owner, claimed = %request.worker_id, "document owner mismatch");
            return Err(AppError::InconsistentInput(format!(
                "document {document_id} does not belong to worker {}",
                request.worker_id
            )));
        }
    }

    let mut txn = store.begin_worker(request.worker_id).await?;
    let stored = txn
        .upsert_document(
            document_id,
            request.document_type,
            request.storage_ref.as_deref(),
        )
        .await?;
    if stored.document_type != request.document_type {
        warn!(
            %document_id,
            stored = %stored.document_type,
            submitted = %request.document_type,
            "document type mismatch"
        );
        return Err(AppError::InconsistentInput(format!(
            "document {document_id} is recorded as {}, not {}",
            stored.document_type, request.document_type
        )));
    }

    let review = reconcile(
        document_id,
        stored.revision + 1,
        &request.human_fields,
        &request.extraction,
        Utc::now(),
    )?;
    txn.append_review(&review).await?;

    let jurisdiction = txn.worker().jurisdiction_code.clone();
    let structures = store.load_pay_scales(&jurisdiction).await?;
    let flag = refresh_flag(txn.as_mut(), &structures, today).await?;
    txn.commit().await?;

    info!(
        %document_id,
        worker_id = %request.worker_id,
        revision = review.revision,
        band = review.band.as_str(),
        warnings = review.warnings.len(),
        flag = %flag.severity,
        "document confirmed"
    );
    Ok(review)
}
