//! In-process `EngineStore` used by the test suite.
//!
//! Per-worker `tokio::sync::Mutex` gives the same single-writer guarantee the
//! Postgres row lock does. A `MemoryTxn` works on a private copy of the
//! worker's data and publishes it on `commit`; dropping it discards the copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::audit::{AuditFlag, AuditFlagView};
use crate::career::CareerAction;
use crate::documents::{DocumentRecord, DocumentType, ReconciledDocument};
use crate::errors::AppError;
use crate::models::worker::{Snapshot, Worker};
use crate::pay_scale::SalaryStructure;
use crate::store::{DocumentSlot, EngineStore, WorkerTxn};

#[derive(Debug, Clone)]
struct StoredDocument {
    record: DocumentRecord,
    reviews: Vec<ReconciledDocument>,
    created: u64,
}

#[derive(Default)]
struct State {
    workers: HashMap<Uuid, Worker>,
    actions: HashMap<Uuid, Vec<CareerAction>>,
    documents: HashMap<Uuid, StoredDocument>,
    structures: Vec<SalaryStructure>,
    next_created: u64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_worker(&self, worker: Worker) {
        let mut state = self.state.lock().unwrap();
        state.actions.entry(worker.id).or_default();
        state.workers.insert(worker.id, worker);
    }

    pub fn worker(&self, worker_id: Uuid) -> Option<Worker> {
        self.state.lock().unwrap().workers.get(&worker_id).cloned()
    }

    pub fn ledger(&self, worker_id: Uuid) -> Vec<CareerAction> {
        self.state
            .lock()
            .unwrap()
            .actions
            .get(&worker_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn reviews(&self, document_id: Uuid) -> Vec<ReconciledDocument> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&document_id)
            .map(|d| d.reviews.clone())
            .unwrap_or_default()
    }

    fn worker_lock(&self, worker_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(worker_id)
            .or_default()
            .clone()
    }
}

/// A freshly profiled worker: no grade history unless `grade` is given.
pub fn test_worker(jurisdiction: &str, grade: Option<&str>, date_of_birth: Option<NaiveDate>) -> Worker {
    let grade = grade.map(|g| g.parse().unwrap());
    Worker {
        id: Uuid::new_v4(),
        staff_id: format!("{jurisdiction}/{}", &Uuid::new_v4().simple().to_string()[..6]),
        full_name: "Amina Bello".to_string(),
        date_of_birth,
        jurisdiction_code: jurisdiction.to_string(),
        cadre_code: None,
        snapshot: Snapshot {
            grade_level: grade,
            step: grade.map(|_| "01".parse().unwrap()),
            designation: grade.map(|_| "Administrative Officer".to_string()),
        },
        is_verified: false,
        flag: AuditFlag::default(),
        flag_updated_at: None,
    }
}

#[async_trait]
impl EngineStore for MemoryStore {
    async fn load_pay_scales(&self, jurisdiction: &str) -> Result<Vec<SalaryStructure>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .structures
            .iter()
            .filter(|s| s.jurisdiction_code.eq_ignore_ascii_case(jurisdiction))
            .cloned()
            .collect())
    }

    async fn import_structure(&self, structure: &SalaryStructure) -> Result<(), AppError> {
        self.state.lock().unwrap().structures.push(structure.clone());
        Ok(())
    }

    async fn begin_worker(&self, worker_id: Uuid) -> Result<Box<dyn WorkerTxn>, AppError> {
        let guard = self.worker_lock(worker_id).lock_owned().await;

        let state = self.state.lock().unwrap();
        let worker = state
            .workers
            .get(&worker_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Worker {worker_id} not found")))?;
        let actions = state.actions.get(&worker_id).cloned().unwrap_or_default();
        let documents = state
            .documents
            .iter()
            .filter(|(_, d)| d.record.worker_id == worker_id)
            .map(|(id, d)| (*id, d.clone()))
            .collect();
        let next_created = state.next_created;
        drop(state);

        Ok(Box::new(MemoryTxn {
            _guard: guard,
            state: Arc::clone(&self.state),
            worker,
            actions,
            documents,
            next_created,
        }))
    }

    async fn document_owner(&self, document_id: Uuid) -> Result<Option<Uuid>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .get(&document_id)
            .map(|d| d.record.worker_id))
    }

    async fn audit_flag(&self, worker_id: Uuid) -> Result<Option<AuditFlagView>, AppError> {
        Ok(self.worker(worker_id).map(|w| AuditFlagView {
            worker_id: w.id,
            flagged: w.flag.is_flagged(),
            severity: w.flag.severity,
            reason: w.flag.reason,
            evaluated_at: w.flag_updated_at,
        }))
    }
}

struct MemoryTxn {
    _guard: OwnedMutexGuard<()>,
    state: Arc<Mutex<State>>,
    worker: Worker,
    actions: Vec<CareerAction>,
    documents: HashMap<Uuid, StoredDocument>,
    next_created: u64,
}

#[async_trait]
impl WorkerTxn for MemoryTxn {
    fn worker(&self) -> &Worker {
        &self.worker
    }

    async fn career_actions(&mut self) -> Result<Vec<CareerAction>, AppError> {
        let mut actions = self.actions.clone();
        actions.sort_by_key(|a| (a.effective_date, a.sequence));
        Ok(actions)
    }

    async fn documents(&mut self) -> Result<Vec<DocumentRecord>, AppError> {
        let mut docs: Vec<_> = self.documents.values().collect();
        docs.sort_by_key(|d| d.created);
        Ok(docs.into_iter().map(|d| d.record.clone()).collect())
    }

    async fn append_action(&mut self, action: &CareerAction) -> Result<(), AppError> {
        self.actions.push(action.clone());
        Ok(())
    }

    async fn update_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), AppError> {
        self.worker.snapshot = snapshot.clone();
        Ok(())
    }

    async fn upsert_document(
        &mut self,
        document_id: Uuid,
        document_type: DocumentType,
        storage_ref: Option<&str>,
    ) -> Result<DocumentSlot, AppError> {
        if let Some(existing) = self.documents.get(&document_id) {
            return Ok(DocumentSlot {
                document_type: existing.record.document_type,
                revision: existing.reviews.last().map(|r| r.revision).unwrap_or(0),
            });
        }
        if let Some(other) = self.state.lock().unwrap().documents.get(&document_id) {
            return Err(AppError::InconsistentInput(format!(
                "document {document_id} belongs to worker {}",
                other.record.worker_id
            )));
        }
        self.next_created += 1;
        self.documents.insert(
            document_id,
            StoredDocument {
                record: DocumentRecord {
                    id: document_id,
                    worker_id: self.worker.id,
                    document_type,
                    storage_ref: storage_ref.map(str::to_string),
                    review: None,
                },
                reviews: Vec::new(),
                created: self.next_created,
            },
        );
        Ok(DocumentSlot {
            document_type,
            revision: 0,
        })
    }

    async fn append_review(&mut self, review: &ReconciledDocument) -> Result<(), AppError> {
        let doc = self
            .documents
            .get_mut(&review.document_id)
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", review.document_id)))?;
        doc.reviews.push(review.clone());
        doc.record.review = Some(review.clone());
        Ok(())
    }

    async fn update_flag(&mut self, flag: &AuditFlag) -> Result<(), AppError> {
        self.worker.flag = flag.clone();
        self.worker.flag_updated_at = Some(Utc::now());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTxn {
            _guard,
            state,
            worker,
            actions,
            documents,
            next_created,
        } = *self;

        let mut state = state.lock().unwrap();
        let worker_id = worker.id;
        state.workers.insert(worker_id, worker);
        state.actions.insert(worker_id, actions);
        state.documents.extend(documents);
        state.next_created = state.next_created.max(next_created);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::{CareerActionKind, PayResolution};

    #[tokio::test]
    async fn test_dropped_txn_rolls_back() {
        let store = MemoryStore::new();
        let worker = test_worker("EB", Some("08"), None);
        let id = worker.id;
        store.insert_worker(worker);

        {
            let mut txn = store.begin_worker(id).await.unwrap();
            txn.append_action(&CareerAction {
                id: Uuid::new_v4(),
                worker_id: id,
                sequence: 1,
                kind: CareerActionKind::Promotion,
                effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                grade_level: "09".parse().unwrap(),
                step: "01".parse().unwrap(),
                designation: "Officer".to_string(),
                compensation: None,
                pay_resolution: PayResolution::NoApplicableStructure,
                salary_structure_id: None,
                authority_reference: "REF".to_string(),
                gazette_number: None,
                remarks: None,
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();
            txn.update_snapshot(&Snapshot::default()).await.unwrap();
            // dropped without commit
        }

        assert!(store.ledger(id).is_empty());
        assert_eq!(
            store.worker(id).unwrap().snapshot.grade_level.unwrap().to_string(),
            "08"
        );
    }

    #[tokio::test]
    async fn test_lock_released_after_commit() {
        let store = MemoryStore::new();
        let worker = test_worker("EB", None, None);
        let id = worker.id;
        store.insert_worker(worker);

        let txn = store.begin_worker(id).await.unwrap();
        txn.commit().await.unwrap();
        let again = tokio::time::timeout(std::time::Duration::from_secs(1), store.begin_worker(id)).await;
        assert!(again.is_ok(), "second writer must not block after commit");
    }
}
