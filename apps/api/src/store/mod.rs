//! Storage seam for the engine.
//!
//! `EngineStore` is carried in `AppState` as `Arc<dyn EngineStore>`. Writes for a
//! worker go through a `WorkerTxn`, which holds that worker's exclusive lock for
//! its whole lifetime. Everything staged on a `WorkerTxn` becomes visible on
//! `commit` or not at all; dropping it rolls back.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::audit::{AuditFlag, AuditFlagView};
use crate::career::CareerAction;
use crate::documents::{DocumentRecord, DocumentType, ReconciledDocument};
use crate::errors::AppError;
use crate::models::worker::{Snapshot, Worker};
use crate::pay_scale::SalaryStructure;

pub use postgres::PgStore;

/// A document's stored type and its latest review revision (0 if never reviewed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSlot {
    pub document_type: DocumentType,
    pub revision: i32,
}

#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Every structure (with rows) for a jurisdiction. Read-only data.
    async fn load_pay_scales(&self, jurisdiction: &str) -> Result<Vec<SalaryStructure>, AppError>;

    /// Persists a validated structure and its rows atomically.
    async fn import_structure(&self, structure: &SalaryStructure) -> Result<(), AppError>;

    /// Opens the single-writer unit of work for one worker.
    /// Fails with `NotFound` when the worker does not exist.
    async fn begin_worker(&self, worker_id: Uuid) -> Result<Box<dyn WorkerTxn>, AppError>;

    /// The worker a document belongs to, if the document exists.
    async fn document_owner(&self, document_id: Uuid) -> Result<Option<Uuid>, AppError>;

    /// Reads the cached flag without taking the worker lock.
    async fn audit_flag(&self, worker_id: Uuid) -> Result<Option<AuditFlagView>, AppError>;
}

#[async_trait]
pub trait WorkerTxn: Send {
    /// The worker as staged in this unit of work (reflects `update_snapshot`).
    fn worker(&self) -> &Worker;

    /// Ledger ordered by effective date, then sequence.
    async fn career_actions(&mut self) -> Result<Vec<CareerAction>, AppError>;

    /// The worker's documents with their latest review, ordered by creation.
    async fn documents(&mut self) -> Result<Vec<DocumentRecord>, AppError>;

    async fn append_action(&mut self, action: &CareerAction) -> Result<(), AppError>;

    async fn update_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), AppError>;

    /// Creates the document record if absent and returns what is stored for it.
    async fn upsert_document(
        &mut self,
        document_id: Uuid,
        document_type: DocumentType,
        storage_ref: Option<&str>,
    ) -> Result<DocumentSlot, AppError>;

    async fn append_review(&mut self, review: &ReconciledDocument) -> Result<(), AppError>;

    async fn update_flag(&mut self, flag: &AuditFlag) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
