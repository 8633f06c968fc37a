use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::documents::{ConfidenceBand, DocumentRecord, DocumentType, ReconciledDocument};
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub document_type: String,
    pub storage_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentReviewRow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub revision: i32,
    pub confidence: f64,
    pub band: String,
    pub fields: Value,
    pub warnings: Vec<String>,
    pub is_correction: bool,
    pub reviewed_at: DateTime<Utc>,
}

impl TryFrom<DocumentReviewRow> for ReconciledDocument {
    type Error = AppError;

    fn try_from(row: DocumentReviewRow) -> Result<Self, Self::Error> {
        let band = row
            .band
            .parse::<ConfidenceBand>()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("review {}: {e}", row.id)))?;
        let fields = serde_json::from_value(row.fields)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("review {}: bad fields: {e}", row.id)))?;
        Ok(ReconciledDocument {
            document_id: row.document_id,
            revision: row.revision,
            confidence: row.confidence,
            band,
            fields,
            warnings: row.warnings,
            is_correction: row.is_correction,
            reviewed_at: row.reviewed_at,
        })
    }
}

impl DocumentRow {
    pub fn into_record(self, review: Option<ReconciledDocument>) -> Result<DocumentRecord, AppError> {
        let document_type = self.document_type.parse::<DocumentType>().map_err(|e| {
            AppError::Internal(anyhow::anyhow!("document {}: {e}", self.id))
        })?;
        Ok(DocumentRecord {
            id: self.id,
            worker_id: self.worker_id,
            document_type,
            storage_ref: self.storage_ref,
            review,
        })
    }
}
