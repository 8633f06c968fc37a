use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::career::{CareerAction, CareerActionKind, PayResolution};
use crate::errors::AppError;
use crate::pay_scale::{GradeCode, PayAmounts};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CareerActionRow {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub sequence: i32,
    pub kind: String,
    pub effective_date: NaiveDate,
    pub grade_level: String,
    pub step: String,
    pub designation: String,
    pub basic_salary: Option<i64>,
    pub gross_salary: Option<i64>,
    pub net_salary: Option<i64>,
    pub pay_resolution: String,
    pub salary_structure_id: Option<Uuid>,
    pub authority_reference: String,
    pub gazette_number: Option<String>,
    pub remarks: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<CareerActionRow> for CareerAction {
    type Error = AppError;

    fn try_from(row: CareerActionRow) -> Result<Self, Self::Error> {
        let corrupt = |msg: String| {
            AppError::Internal(anyhow::anyhow!("career action {}: {msg}", row.id))
        };
        let kind = row.kind.parse::<CareerActionKind>().map_err(corrupt)?;
        let pay_resolution = row
            .pay_resolution
            .parse::<PayResolution>()
            .map_err(corrupt)?;
        let grade_level = row
            .grade_level
            .parse::<GradeCode>()
            .map_err(|e| corrupt(e.to_string()))?;
        let step = row
            .step
            .parse::<GradeCode>()
            .map_err(|e| corrupt(e.to_string()))?;
        let compensation = match (row.basic_salary, row.gross_salary, row.net_salary) {
            (Some(basic), Some(gross), Some(net)) => Some(PayAmounts { basic, gross, net }),
            _ => None,
        };

        Ok(CareerAction {
            id: row.id,
            worker_id: row.worker_id,
            sequence: row.sequence,
            kind,
            effective_date: row.effective_date,
            grade_level,
            step,
            designation: row.designation,
            compensation,
            pay_resolution,
            salary_structure_id: row.salary_structure_id,
            authority_reference: row.authority_reference,
            gazette_number: row.gazette_number,
            remarks: row.remarks,
            recorded_at: row.recorded_at,
        })
    }
}
