use chrono::NaiveDate;
use tracing::info;

use crate::audit::{evaluate, AuditFlag, AuditInput};
use crate::career::CareerAction;
use crate::errors::AppError;
use crate::pay_scale::{select_structure, SalaryStructure};
use crate::store::WorkerTxn;

/// Date at which the governing pay structure is chosen: the latest action's
/// effective date, or `today` for a worker with an empty ledger.
pub fn governing_as_of(actions: &[CareerAction], today: NaiveDate) -> NaiveDate {
    actions
        .iter()
        .map(|a| a.effective_date)
        .max()
        .unwrap_or(today)
}

/// Re-evaluates the worker inside an open unit of work and stages the new flag.
/// Callers commit; nothing is visible until they do.
pub async fn refresh_flag(
    txn: &mut dyn WorkerTxn,
    structures: &[SalaryStructure],
    today: NaiveDate,
) -> Result<AuditFlag, AppError> {
    let actions = txn.career_actions().await?;
    let documents = txn.documents().await?;

    let worker = txn.worker();
    let governing = select_structure(
        structures,
        &worker.jurisdiction_code,
        worker.cadre_code.as_deref(),
        governing_as_of(&actions, today),
    );
    let flag = evaluate(&AuditInput {
        worker,
        actions: &actions,
        documents: &documents,
        governing_structure: governing,
    });
    let previous = worker.flag.severity;
    let worker_id = worker.id;

    txn.update_flag(&flag).await?;

    if previous != flag.severity {
        info!(
            %worker_id,
            from = %previous,
            to = %flag.severity,
            "audit flag changed"
        );
    }
    Ok(flag)
}
