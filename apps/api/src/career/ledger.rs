//! `recordCareerAction`.
//!
//! One call is one unit of work under the worker's lock:
//! validate → resolve pay → append action → overwrite snapshot → refresh flag → commit.
//! Any error before `commit` drops the transaction and nothing is written.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{Capability, Operation};
use crate::audit::{refresh_flag, AuditFlag};
use crate::career::transitions::validate_transition;
use crate::career::{CareerAction, CareerActionKind, LedgerError, PayResolution};
use crate::errors::AppError;
use crate::models::worker::Snapshot;
use crate::pay_scale::{resolve, GradeCode, PayQuery, ResolutionMiss};
use crate::store::EngineStore;

/// What to do when the destination grade/step has no pay amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPayPolicy {
    /// Record the action with an unknown amount; the audit flag picks it up.
    #[default]
    Record,
    /// Refuse the action.
    Reject,
}

impl FromStr for UnresolvedPayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(UnresolvedPayPolicy::Record),
            "reject" => Ok(UnresolvedPayPolicy::Reject),
            other => Err(format!("expected 'record' or 'reject', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordActionRequest {
    pub kind: CareerActionKind,
    pub effective_date: NaiveDate,
    pub grade_level: String,
    pub step: String,
    pub designation: String,
    pub authority_reference: String,
    pub gazette_number: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedAction {
    pub action: CareerAction,
    pub snapshot: Snapshot,
    pub flag: AuditFlag,
}

struct NormalizedAction {
    grade_level: GradeCode,
    step: GradeCode,
    designation: String,
    authority_reference: String,
    gazette_number: Option<String>,
    remarks: Option<String>,
}

impl RecordActionRequest {
    fn normalize(&self) -> Result<NormalizedAction, AppError> {
        let designation = self.designation.trim();
        if designation.is_empty() {
            return Err(AppError::InconsistentInput(
                "destination designation is required".to_string(),
            ));
        }
        let authority_reference = self.authority_reference.trim();
        if authority_reference.is_empty() {
            return Err(AppError::InconsistentInput(
                "authority reference is required".to_string(),
            ));
        }
        Ok(NormalizedAction {
            grade_level: self.grade_level.parse()?,
            step: self.step.parse()?,
            designation: designation.to_string(),
            authority_reference: authority_reference.to_string(),
            gazette_number: optional_text(self.gazette_number.as_deref()),
            remarks: optional_text(self.remarks.as_deref()),
        })
    }
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn record_career_action(
    store: &dyn EngineStore,
    policy: UnresolvedPayPolicy,
    capability: Capability,
    worker_id: Uuid,
    request: &RecordActionRequest,
    today: NaiveDate,
) -> Result<RecordedAction, AppError> {
    capability.require(Operation::RecordCareerAction)?;
    let input = request.normalize()?;

    let mut txn = store.begin_worker(worker_id).await?;
    let history = txn.career_actions().await?;
    let latest_effective_date = history.iter().map(|a| a.effective_date).max();
    let next_sequence = history.iter().map(|a| a.sequence).max().unwrap_or(0) + 1;

    let (jurisdiction, cadre, current_grade) = {
        let worker = txn.worker();
        (
            worker.jurisdiction_code.clone(),
            worker.cadre_code.clone(),
            worker.snapshot.grade_level,
        )
    };

    if let Err(e) = validate_transition(
        request.kind,
        request.effective_date,
        input.grade_level,
        latest_effective_date,
        current_grade,
    ) {
        warn!(%worker_id, code = e.code(), "career action rejected: {e}");
        return Err(e.into());
    }

    let structures = store.load_pay_scales(&jurisdiction).await?;
    let query = PayQuery {
        jurisdiction,
        cadre,
        grade_level: input.grade_level,
        step: input.step,
        as_of: request.effective_date,
    };
    let (compensation, pay_resolution, salary_structure_id) = match resolve(&structures, &query) {
        Ok(pay) => (Some(pay.amounts), PayResolution::Resolved, Some(pay.structure_id)),
        Err(miss) => {
            if policy == UnresolvedPayPolicy::Reject {
                let e = LedgerError::UnresolvedCompensation(miss.to_string());
                warn!(%worker_id, code = e.code(), "career action rejected: {e}");
                return Err(e.into());
            }
            warn!(%worker_id, code = miss.code(), "recording career action with unknown pay: {miss}");
            match miss {
                ResolutionMiss::GradeStepNotFound { structure_id, .. } => {
                    (None, PayResolution::GradeStepNotFound, Some(structure_id))
                }
                ResolutionMiss::NoApplicableStructure { .. } => {
                    (None, PayResolution::NoApplicableStructure, None)
                }
            }
        }
    };

    let action = CareerAction {
        id: Uuid::new_v4(),
        worker_id,
        sequence: next_sequence,
        kind: request.kind,
        effective_date: request.effective_date,
        grade_level: input.grade_level,
        step: input.step,
        designation: input.designation.clone(),
        compensation,
        pay_resolution,
        salary_structure_id,
        authority_reference: input.authority_reference,
        gazette_number: input.gazette_number,
        remarks: input.remarks,
        recorded_at: Utc::now(),
    };
    txn.append_action(&action).await?;

    let snapshot = Snapshot {
        grade_level: Some(input.grade_level),
        step: Some(input.step),
        designation: Some(input.designation),
    };
    txn.update_snapshot(&snapshot).await?;

    let flag = refresh_flag(txn.as_mut(), &structures, today).await?;
    txn.commit().await?;

    info!(
        %worker_id,
        action_id = %action.id,
        kind = %action.kind,
        effective = %action.effective_date,
        grade = %action.grade_level,
        step = %action.step,
        pay = action.pay_resolution.as_str(),
        flag = %flag.severity,
        "career action recorded"
    );

    Ok(RecordedAction {
        action,
        snapshot,
        flag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Severity;
    use crate::store::memory::{test_worker, MemoryStore};
    use crate::store::EngineStore;
    use crate::pay_scale::{GradeRow, PayAmounts, SalaryStructure};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 1, 1)
    }

    fn conpss_2024() -> SalaryStructure {
        SalaryStructure {
            id: Uuid::new_v4(),
            jurisdiction_code: "EB".to_string(),
            cadre_code: None,
            name: "CONPSS-2024".to_string(),
            effective_date: date(2024, 1, 1),
            is_default: true,
            rows: (1..=15u8)
                .flat_map(|g| {
                    (1..=3u8).map(move |s| GradeRow {
                        grade_level: GradeCode::new(g).unwrap(),
                        step: GradeCode::new(s).unwrap(),
                        amounts: PayAmounts {
                            basic: g as i64 * 10_000 + s as i64 * 100,
                            gross: g as i64 * 12_000 + s as i64 * 100,
                            net: g as i64 * 9_000 + s as i64 * 100,
                        },
                    })
                })
                .collect(),
        }
    }

    fn request(kind: CareerActionKind, effective: NaiveDate, grade: &str) -> RecordActionRequest {
        RecordActionRequest {
            kind,
            effective_date: effective,
            grade_level: grade.to_string(),
            step: "1".to_string(),
            designation: "Senior Administrative Officer".to_string(),
            authority_reference: "EB/CSC/2024/031".to_string(),
            gazette_number: Some("Vol. 12 No. 4".to_string()),
            remarks: None,
        }
    }

    async fn setup(grade: Option<&str>) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        store.import_structure(&conpss_2024()).await.unwrap();
        let worker = test_worker("EB", grade, None);
        let id = worker.id;
        store.insert_worker(worker);
        (store, id)
    }

    async fn record(
        store: &MemoryStore,
        worker_id: Uuid,
        req: &RecordActionRequest,
    ) -> Result<RecordedAction, AppError> {
        record_career_action(
            store,
            UnresolvedPayPolicy::Record,
            Capability::Clerk,
            worker_id,
            req,
            today(),
        )
        .await
    }

    #[tokio::test]
    async fn test_promotion_updates_snapshot_and_resolves_pay() {
        let (store, id) = setup(Some("08")).await;
        let recorded = record(&store, id, &request(CareerActionKind::Promotion, date(2024, 3, 1), "9"))
            .await
            .unwrap();

        assert_eq!(recorded.action.pay_resolution, PayResolution::Resolved);
        assert_eq!(recorded.action.compensation.unwrap().basic, 90_100);
        assert_eq!(recorded.action.sequence, 1);
        assert_eq!(recorded.flag.severity, Severity::None);

        let worker = store.worker(id).unwrap();
        assert_eq!(worker.snapshot.grade_level.unwrap().to_string(), "09");
        assert_eq!(
            worker.snapshot.designation.as_deref(),
            Some("Senior Administrative Officer")
        );
        assert_eq!(store.ledger(id).len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_action_rejected_without_writes() {
        let (store, id) = setup(Some("07")).await;
        record(&store, id, &request(CareerActionKind::Promotion, date(2024, 6, 1), "08"))
            .await
            .unwrap();
        let before = store.worker(id).unwrap();

        let err = record(&store, id, &request(CareerActionKind::Promotion, date(2024, 5, 1), "09"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::Ledger(LedgerError::OutOfOrderAction { .. })),
            "got {err:?}"
        );
        assert_eq!(store.ledger(id).len(), 1, "no ledger row written");
        assert_eq!(store.worker(id).unwrap().snapshot, before.snapshot, "snapshot unchanged");
    }

    #[tokio::test]
    async fn test_illegal_promotion_rejected() {
        let (store, id) = setup(Some("08")).await;
        let err = record(&store, id, &request(CareerActionKind::Promotion, date(2024, 6, 1), "08"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::IllegalGradeTransition { .. })
        ));
        assert!(store.ledger(id).is_empty());
    }

    #[tokio::test]
    async fn test_demotion_lowers_grade() {
        let (store, id) = setup(Some("10")).await;
        let recorded = record(&store, id, &request(CareerActionKind::Demotion, date(2024, 6, 1), "9"))
            .await
            .unwrap();
        assert_eq!(recorded.snapshot.grade_level.unwrap().to_string(), "09");
    }

    #[tokio::test]
    async fn test_promotion_past_scale_is_recorded_but_critical() {
        let (store, id) = setup(Some("15")).await;
        let recorded = record(&store, id, &request(CareerActionKind::Promotion, date(2024, 6, 1), "16"))
            .await
            .unwrap();

        assert_eq!(recorded.action.pay_resolution, PayResolution::GradeStepNotFound);
        assert!(recorded.action.compensation.is_none());
        assert_eq!(recorded.flag.severity, Severity::Critical);
        assert!(recorded.flag.reason.contains("exceeds the maximum grade 15"));
        assert!(recorded.flag.reason.contains("absent from the pay scale"));

        let stored = store.worker(id).unwrap();
        assert_eq!(stored.flag, recorded.flag, "flag persisted with the action");
    }

    #[tokio::test]
    async fn test_missing_step_is_medium() {
        let (store, id) = setup(Some("08")).await;
        let mut req = request(CareerActionKind::Advancement, date(2024, 6, 1), "09");
        req.step = "07".to_string();
        let recorded = record(&store, id, &req).await.unwrap();
        assert_eq!(recorded.action.pay_resolution, PayResolution::GradeStepNotFound);
        assert_eq!(recorded.flag.severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_no_structure_yet_is_recorded_without_flag() {
        let (store, id) = setup(None).await;
        let recorded = record(&store, id, &request(CareerActionKind::Probation, date(2019, 6, 1), "07"))
            .await
            .unwrap();
        assert_eq!(
            recorded.action.pay_resolution,
            PayResolution::NoApplicableStructure
        );
        assert_eq!(recorded.flag.severity, Severity::None);
    }

    #[tokio::test]
    async fn test_reject_policy_blocks_unresolved_pay() {
        let (store, id) = setup(Some("15")).await;
        let err = record_career_action(
            &store,
            UnresolvedPayPolicy::Reject,
            Capability::Clerk,
            id,
            &request(CareerActionKind::Promotion, date(2024, 6, 1), "16"),
            today(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::UnresolvedCompensation(_))
        ));
        assert!(store.ledger(id).is_empty());
        assert_eq!(store.worker(id).unwrap().snapshot.grade_level.unwrap().to_string(), "15");
    }

    #[tokio::test]
    async fn test_viewer_cannot_record() {
        let (store, id) = setup(Some("08")).await;
        let err = record_career_action(
            &store,
            UnresolvedPayPolicy::Record,
            Capability::Viewer,
            id,
            &request(CareerActionKind::Promotion, date(2024, 6, 1), "09"),
            today(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_missing_authority_is_inconsistent_input() {
        let (store, id) = setup(Some("08")).await;
        let mut req = request(CareerActionKind::Promotion, date(2024, 6, 1), "09");
        req.authority_reference = "  ".to_string();
        assert!(matches!(
            record(&store, id, &req).await,
            Err(AppError::InconsistentInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_worker_is_not_found() {
        let (store, _) = setup(Some("08")).await;
        let err = record(&store, Uuid::new_v4(), &request(CareerActionKind::Transfer, date(2024, 6, 1), "08"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_accepted_dates_are_non_decreasing() {
        let (store, id) = setup(Some("03")).await;
        let attempts = [
            (CareerActionKind::Confirmation, date(2024, 2, 1), "03"),
            (CareerActionKind::Promotion, date(2024, 5, 1), "04"),
            (CareerActionKind::Transfer, date(2024, 3, 1), "04"),
            (CareerActionKind::Promotion, date(2024, 5, 1), "05"),
            (CareerActionKind::Demotion, date(2024, 4, 1), "04"),
            (CareerActionKind::Secondment, date(2024, 9, 1), "05"),
            (CareerActionKind::Demotion, date(2024, 10, 1), "04"),
        ];
        for (kind, when, grade) in attempts {
            let _ = record(&store, id, &request(kind, when, grade)).await;
        }

        let ledger = store.ledger(id);
        assert_eq!(ledger.len(), 5, "two out-of-order attempts rejected");
        for pair in ledger.windows(2) {
            assert!(pair[0].effective_date <= pair[1].effective_date);
            if pair[1].kind == CareerActionKind::Promotion {
                assert!(pair[1].grade_level > pair[0].grade_level);
            }
            if pair[1].kind == CareerActionKind::Demotion {
                assert!(pair[1].grade_level < pair[0].grade_level);
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let (store, id) = setup(Some("01")).await;
        let mut handles = Vec::new();
        for i in 0..8u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let req = request(CareerActionKind::Transfer, date(2024, 1, 1 + i), "05");
                record(&store, id, &req).await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let ledger = store.ledger(id);
        assert!(!ledger.is_empty());
        let sequences: Vec<_> = ledger.iter().map(|a| a.sequence).collect();
        let expected: Vec<_> = (1..=ledger.len() as i32).collect();
        assert_eq!(sequences, expected, "no two writers took the same sequence");
        for pair in ledger.windows(2) {
            assert!(pair[0].effective_date <= pair[1].effective_date);
        }
    }
}
