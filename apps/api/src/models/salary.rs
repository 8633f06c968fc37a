use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::pay_scale::{GradeCodeError, GradeRow, PayAmounts, SalaryStructure};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalaryStructureRow {
    pub id: Uuid,
    pub jurisdiction_code: String,
    pub cadre_code: Option<String>,
    pub name: String,
    pub effective_date: NaiveDate,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalaryGradeRowRecord {
    pub id: Uuid,
    pub structure_id: Uuid,
    pub grade_level: String,
    pub step: String,
    pub basic_salary: i64,
    pub gross_salary: i64,
    pub net_salary: i64,
}

impl TryFrom<&SalaryGradeRowRecord> for GradeRow {
    type Error = AppError;

    fn try_from(row: &SalaryGradeRowRecord) -> Result<Self, Self::Error> {
        let corrupt = |e: GradeCodeError| {
            AppError::Internal(anyhow::anyhow!("grade row {}: {e}", row.id))
        };
        Ok(GradeRow {
            grade_level: row.grade_level.parse().map_err(corrupt)?,
            step: row.step.parse().map_err(corrupt)?,
            amounts: PayAmounts {
                basic: row.basic_salary,
                gross: row.gross_salary,
                net: row.net_salary,
            },
        })
    }
}

/// Groups grade rows under their structures.
pub fn assemble_structures(
    structures: Vec<SalaryStructureRow>,
    rows: &[SalaryGradeRowRecord],
) -> Result<Vec<SalaryStructure>, AppError> {
    structures
        .into_iter()
        .map(|s| {
            let grade_rows = rows
                .iter()
                .filter(|r| r.structure_id == s.id)
                .map(GradeRow::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SalaryStructure {
                id: s.id,
                jurisdiction_code: s.jurisdiction_code,
                cadre_code: s.cadre_code,
                name: s.name,
                effective_date: s.effective_date,
                is_default: s.is_default,
                rows: grade_rows,
            })
        })
        .collect()
}
