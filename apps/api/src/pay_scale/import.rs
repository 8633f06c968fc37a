use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::access::{Capability, Operation};
use crate::errors::AppError;
use crate::pay_scale::{GradeCode, GradeRow, PayAmounts, SalaryStructure};
use crate::store::EngineStore;

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    pub grade_level: String,
    pub step: String,
    pub basic: i64,
    pub gross: i64,
    pub net: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportStructureRequest {
    pub jurisdiction_code: String,
    pub cadre_code: Option<String>,
    pub name: String,
    pub effective_date: NaiveDate,
    #[serde(default)]
    pub is_default: bool,
    pub rows: Vec<ImportRow>,
}

#[derive(Debug, Serialize)]
pub struct ImportStructureResponse {
    pub structure_id: Uuid,
    pub name: String,
    pub row_count: usize,
    pub max_grade_level: Option<GradeCode>,
}

/// Normalizes and validates an import into a structure ready to persist.
pub fn build_structure(request: &ImportStructureRequest) -> Result<SalaryStructure, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InconsistentInput(
            "salary structure name is required".to_string(),
        ));
    }
    let jurisdiction = request.jurisdiction_code.trim();
    if jurisdiction.is_empty() {
        return Err(AppError::InconsistentInput(
            "jurisdiction_code is required".to_string(),
        ));
    }
    if request.rows.is_empty() {
        return Err(AppError::InconsistentInput(format!(
            "salary structure '{name}' has no grade rows"
        )));
    }

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(request.rows.len());
    for (i, raw) in request.rows.iter().enumerate() {
        let grade_level: GradeCode = raw.grade_level.parse()?;
        let step: GradeCode = raw.step.parse()?;
        if !seen.insert((grade_level, step)) {
            return Err(AppError::InconsistentInput(format!(
                "row {}: grade {grade_level} step {step} appears more than once",
                i + 1
            )));
        }
        let amounts = PayAmounts {
            basic: raw.basic,
            gross: raw.gross,
            net: raw.net,
        };
        check_amounts(&amounts).map_err(|msg| {
            AppError::InconsistentInput(format!(
                "row {} (grade {grade_level} step {step}): {msg}",
                i + 1
            ))
        })?;
        rows.push(GradeRow {
            grade_level,
            step,
            amounts,
        });
    }
    rows.sort_by_key(|r| (r.grade_level, r.step));

    Ok(SalaryStructure {
        id: Uuid::new_v4(),
        jurisdiction_code: jurisdiction.to_ascii_uppercase(),
        cadre_code: request
            .cadre_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_ascii_uppercase),
        name: name.to_string(),
        effective_date: request.effective_date,
        is_default: request.is_default,
        rows,
    })
}

fn check_amounts(amounts: &PayAmounts) -> Result<(), &'static str> {
    if amounts.basic < 0 || amounts.gross < 0 || amounts.net < 0 {
        return Err("amounts cannot be negative");
    }
    if amounts.basic > amounts.gross {
        return Err("basic exceeds gross");
    }
    if amounts.net > amounts.gross {
        return Err("net exceeds gross");
    }
    Ok(())
}

/// Rejects imports that would make structure selection ambiguous.
fn check_against_existing(
    candidate: &SalaryStructure,
    existing: &[SalaryStructure],
) -> Result<(), AppError> {
    if existing
        .iter()
        .any(|s| s.name.eq_ignore_ascii_case(&candidate.name))
    {
        return Err(AppError::Validation(format!(
            "salary structure '{}' already exists for jurisdiction {}; pay changes must be imported as a new structure",
            candidate.name, candidate.jurisdiction_code
        )));
    }
    if candidate.is_default
        && existing
            .iter()
            .any(|s| s.is_default && s.effective_date == candidate.effective_date)
    {
        return Err(AppError::Validation(format!(
            "jurisdiction {} already has a default structure effective {}",
            candidate.jurisdiction_code, candidate.effective_date
        )));
    }
    Ok(())
}

/// `importSalaryStructure` entry point. Structures are never edited after this.
pub async fn import_salary_structure(
    store: &dyn EngineStore,
    capability: Capability,
    request: &ImportStructureRequest,
) -> Result<ImportStructureResponse, AppError> {
    capability.require(Operation::ImportSalaryStructure)?;

    let structure = build_structure(request)?;
    let existing = store.load_pay_scales(&structure.jurisdiction_code).await?;
    check_against_existing(&structure, &existing)?;

    store.import_structure(&structure).await?;

    info!(
        structure_id = %structure.id,
        jurisdiction = %structure.jurisdiction_code,
        name = %structure.name,
        rows = structure.rows.len(),
        effective = %structure.effective_date,
        "salary structure imported"
    );

    Ok(ImportStructureResponse {
        structure_id: structure.id,
        name: structure.name.clone(),
        row_count: structure.rows.len(),
        max_grade_level: structure.max_grade_level(),
    })
}
