use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::audit::{AuditFlag, Severity};
use crate::errors::AppError;
use crate::pay_scale::GradeCode;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkerRow {
    pub id: Uuid,
    pub staff_id: String,
    pub first_name: String,
    pub last_name: String,
    pub other_names: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub jurisdiction_code: String,
    pub cadre_code: Option<String>,
    pub grade_level: Option<String>,
    pub step: Option<String>,
    pub designation: Option<String>,
    pub is_verified: bool,
    pub flag_severity: String,
    pub flag_reason: String,
    pub flag_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current grade/step/designation. Written only by the career ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub grade_level: Option<GradeCode>,
    pub step: Option<GradeCode>,
    pub designation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub staff_id: String,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub jurisdiction_code: String,
    pub cadre_code: Option<String>,
    pub snapshot: Snapshot,
    pub is_verified: bool,
    pub flag: AuditFlag,
    pub flag_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkerRow> for Worker {
    type Error = AppError;

    fn try_from(row: WorkerRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            AppError::Internal(anyhow::anyhow!(
                "worker {} has a corrupt {what} column",
                row.id
            ))
        };
        let grade_level = row
            .grade_level
            .as_deref()
            .map(str::parse::<GradeCode>)
            .transpose()
            .map_err(|_| corrupt("grade_level"))?;
        let step = row
            .step
            .as_deref()
            .map(str::parse::<GradeCode>)
            .transpose()
            .map_err(|_| corrupt("step"))?;
        let severity = row
            .flag_severity
            .parse::<Severity>()
            .map_err(|_| corrupt("flag_severity"))?;

        let full_name = [Some(&row.first_name), row.other_names.as_ref(), Some(&row.last_name)]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Worker {
            id: row.id,
            staff_id: row.staff_id,
            full_name,
            date_of_birth: row.date_of_birth,
            jurisdiction_code: row.jurisdiction_code,
            cadre_code: row.cadre_code,
            snapshot: Snapshot {
                grade_level,
                step,
                designation: row.designation,
            },
            is_verified: row.is_verified,
            flag: AuditFlag {
                severity,
                reason: row.flag_reason,
            },
            flag_updated_at: row.flag_updated_at,
        })
    }
}
