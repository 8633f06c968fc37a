//! Postgres-backed `EngineStore`.
//!
//! A `PgWorkerTxn` is a database transaction that opened with
//! `SELECT … FOR UPDATE` on the worker row, so concurrent writers for the same
//! worker queue behind it. Ledger and review tables are INSERT-only; the only
//! UPDATEs touch the worker's snapshot and flag columns.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::audit::{AuditFlag, AuditFlagView};
use crate::career::CareerAction;
use crate::documents::{DocumentRecord, DocumentType, ReconciledDocument};
use crate::errors::AppError;
use crate::models::career::CareerActionRow;
use crate::models::document::{DocumentReviewRow, DocumentRow};
use crate::models::salary::{assemble_structures, SalaryGradeRowRecord, SalaryStructureRow};
use crate::models::worker::{Snapshot, Worker, WorkerRow};
use crate::pay_scale::SalaryStructure;
use crate::store::{DocumentSlot, EngineStore, WorkerTxn};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EngineStore for PgStore {
    async fn load_pay_scales(&self, jurisdiction: &str) -> Result<Vec<SalaryStructure>, AppError> {
        let structures = sqlx::query_as::<_, SalaryStructureRow>(
            r#"
            SELECT * FROM salary_structures
            WHERE UPPER(jurisdiction_code) = UPPER($1)
            ORDER BY effective_date DESC, name
            "#,
        )
        .bind(jurisdiction)
        .fetch_all(&self.pool)
        .await?;
        if structures.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = structures.iter().map(|s| s.id).collect();
        let rows = sqlx::query_as::<_, SalaryGradeRowRecord>(
            "SELECT * FROM salary_grade_rows WHERE structure_id = ANY($1) ORDER BY grade_level, step",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        assemble_structures(structures, &rows)
    }

    async fn import_structure(&self, structure: &SalaryStructure) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO salary_structures
                (id, jurisdiction_code, cadre_code, name, effective_date, is_default)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(structure.id)
        .bind(&structure.jurisdiction_code)
        .bind(&structure.cadre_code)
        .bind(&structure.name)
        .bind(structure.effective_date)
        .bind(structure.is_default)
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_violation_as(e, "salary structure already exists"))?;

        for row in &structure.rows {
            sqlx::query(
                r#"
                INSERT INTO salary_grade_rows
                    (structure_id, grade_level, step, basic_salary, gross_salary, net_salary)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(structure.id)
            .bind(row.grade_level.to_string())
            .bind(row.step.to_string())
            .bind(row.amounts.basic)
            .bind(row.amounts.gross)
            .bind(row.amounts.net)
            .execute(&mut *tx)
            .await
            .map_err(|e| constraint_violation_as(e, "duplicate grade/step row"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn begin_worker(&self, worker_id: Uuid) -> Result<Box<dyn WorkerTxn>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<WorkerRow> =
            sqlx::query_as("SELECT * FROM workers WHERE id = $1 FOR UPDATE")
                .bind(worker_id)
                .fetch_optional(&mut *tx)
                .await?;
        let worker = Worker::try_from(
            row.ok_or_else(|| AppError::NotFound(format!("Worker {worker_id} not found")))?,
        )?;
        debug!(%worker_id, "worker lock acquired");

        Ok(Box::new(PgWorkerTxn { tx, worker }))
    }

    async fn document_owner(&self, document_id: Uuid) -> Result<Option<Uuid>, AppError> {
        Ok(
            sqlx::query_scalar("SELECT worker_id FROM documents WHERE id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn audit_flag(&self, worker_id: Uuid) -> Result<Option<AuditFlagView>, AppError> {
        let row: Option<WorkerRow> = sqlx::query_as("SELECT * FROM workers WHERE id = $1")
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Worker::try_from)
            .transpose()
            .map(|worker| {
                worker.map(|w| AuditFlagView {
                    worker_id: w.id,
                    flagged: w.flag.is_flagged(),
                    severity: w.flag.severity,
                    reason: w.flag.reason,
                    evaluated_at: w.flag_updated_at,
                })
            })
    }
}

fn constraint_violation_as(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Validation(message.to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::Validation("unknown jurisdiction".to_string())
        }
        _ => AppError::Database(e),
    }
}

struct PgWorkerTxn {
    tx: Transaction<'static, Postgres>,
    worker: Worker,
}

#[async_trait]
impl WorkerTxn for PgWorkerTxn {
    fn worker(&self) -> &Worker {
        &self.worker
    }

    async fn career_actions(&mut self) -> Result<Vec<CareerAction>, AppError> {
        let rows = sqlx::query_as::<_, CareerActionRow>(
            "SELECT * FROM career_actions WHERE worker_id = $1 ORDER BY effective_date, sequence",
        )
        .bind(self.worker.id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(CareerAction::try_from).collect()
    }

    async fn documents(&mut self) -> Result<Vec<DocumentRecord>, AppError> {
        let docs = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE worker_id = $1 ORDER BY created_at, id",
        )
        .bind(self.worker.id)
        .fetch_all(&mut *self.tx)
        .await?;

        let latest = sqlx::query_as::<_, DocumentReviewRow>(
            r#"
            SELECT DISTINCT ON (r.document_id) r.*
            FROM document_reviews r
            JOIN documents d ON d.id = r.document_id
            WHERE d.worker_id = $1
            ORDER BY r.document_id, r.revision DESC
            "#,
        )
        .bind(self.worker.id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut reviews = latest
            .into_iter()
            .map(ReconciledDocument::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        docs.into_iter()
            .map(|doc| {
                let review = reviews
                    .iter()
                    .position(|r| r.document_id == doc.id)
                    .map(|i| reviews.swap_remove(i));
                doc.into_record(review)
            })
            .collect()
    }

    async fn append_action(&mut self, action: &CareerAction) -> Result<(), AppError> {
        let (basic, gross, net) = match action.compensation {
            Some(pay) => (Some(pay.basic), Some(pay.gross), Some(pay.net)),
            None => (None, None, None),
        };
        sqlx::query(
            r#"
            INSERT INTO career_actions
                (id, worker_id, sequence, kind, effective_date, grade_level, step, designation,
                 basic_salary, gross_salary, net_salary, pay_resolution, salary_structure_id,
                 authority_reference, gazette_number, remarks, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(action.id)
        .bind(action.worker_id)
        .bind(action.sequence)
        .bind(action.kind.as_str())
        .bind(action.effective_date)
        .bind(action.grade_level.to_string())
        .bind(action.step.to_string())
        .bind(&action.designation)
        .bind(basic)
        .bind(gross)
        .bind(net)
        .bind(action.pay_resolution.as_str())
        .bind(action.salary_structure_id)
        .bind(&action.authority_reference)
        .bind(&action.gazette_number)
        .bind(&action.remarks)
        .bind(action.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE workers
            SET grade_level = $1, step = $2, designation = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(snapshot.grade_level.map(|g| g.to_string()))
        .bind(snapshot.step.map(|s| s.to_string()))
        .bind(&snapshot.designation)
        .bind(self.worker.id)
        .execute(&mut *self.tx)
        .await?;
        self.worker.snapshot = snapshot.clone();
        Ok(())
    }

    async fn upsert_document(
        &mut self,
        document_id: Uuid,
        document_type: DocumentType,
        storage_ref: Option<&str>,
    ) -> Result<DocumentSlot, AppError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, worker_id, document_type, storage_ref)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(document_id)
        .bind(self.worker.id)
        .bind(document_type.as_str())
        .bind(storage_ref)
        .execute(&mut *self.tx)
        .await?;

        let (owner, stored_type): (Uuid, String) =
            sqlx::query_as("SELECT worker_id, document_type FROM documents WHERE id = $1")
                .bind(document_id)
                .fetch_one(&mut *self.tx)
                .await?;
        if owner != self.worker.id {
            return Err(AppError::InconsistentInput(format!(
                "document {document_id} belongs to worker {owner}"
            )));
        }

        let current: Option<i32> =
            sqlx::query_scalar("SELECT MAX(revision) FROM document_reviews WHERE document_id = $1")
                .bind(document_id)
                .fetch_one(&mut *self.tx)
                .await?;
        let document_type = stored_type.parse::<DocumentType>().map_err(|e| {
            AppError::Internal(anyhow::anyhow!("document {document_id}: {e}"))
        })?;
        Ok(DocumentSlot {
            document_type,
            revision: current.unwrap_or(0),
        })
    }

    async fn append_review(&mut self, review: &ReconciledDocument) -> Result<(), AppError> {
        let fields = serde_json::to_value(&review.fields)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serializing review fields: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO document_reviews
                (document_id, revision, confidence, band, fields, warnings, is_correction, reviewed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(review.document_id)
        .bind(review.revision)
        .bind(review.confidence)
        .bind(review.band.as_str())
        .bind(fields)
        .bind(&review.warnings)
        .bind(review.is_correction)
        .bind(review.reviewed_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_flag(&mut self, flag: &AuditFlag) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE workers
            SET flag_severity = $1, flag_reason = $2, flag_updated_at = NOW(), updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(flag.severity.as_str())
        .bind(&flag.reason)
        .bind(self.worker.id)
        .execute(&mut *self.tx)
        .await?;
        self.worker.flag = flag.clone();
        self.worker.flag_updated_at = Some(Utc::now());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
