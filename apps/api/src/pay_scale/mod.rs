// Pay Scale Resolver
// Jurisdiction-scoped, versioned salary structures keyed by (grade level, step).
// Structures are immutable once imported; a pay change is a new structure with a
// later effective date.

pub mod grade;
pub mod handlers;
pub mod import;
pub mod resolver;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use grade::{GradeCode, GradeCodeError};
pub use resolver::{resolve, resolve_salary, select_structure, PayQuery};

/// Monetary amounts in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayAmounts {
    pub basic: i64,
    pub gross: i64,
    pub net: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRow {
    pub grade_level: GradeCode,
    pub step: GradeCode,
    pub amounts: PayAmounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryStructure {
    pub id: Uuid,
    pub jurisdiction_code: String,
    /// `None` means the structure applies jurisdiction-wide.
    pub cadre_code: Option<String>,
    pub name: String,
    pub effective_date: NaiveDate,
    pub is_default: bool,
    pub rows: Vec<GradeRow>,
}

impl SalaryStructure {
    pub fn row(&self, grade_level: GradeCode, step: GradeCode) -> Option<&GradeRow> {
        self.rows
            .iter()
            .find(|r| r.grade_level == grade_level && r.step == step)
    }

    /// Highest grade level present in the table, if it has any rows.
    pub fn max_grade_level(&self) -> Option<GradeCode> {
        self.rows.iter().map(|r| r.grade_level).max()
    }
}

/// A successful lookup, carrying enough provenance to audit the amount later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPay {
    pub structure_id: Uuid,
    pub structure_name: String,
    pub effective_date: NaiveDate,
    pub grade_level: GradeCode,
    pub step: GradeCode,
    pub amounts: PayAmounts,
}

/// Recoverable lookup failures. Callers show an unknown amount and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionMiss {
    #[error("no salary structure applies to jurisdiction '{jurisdiction}' as of {as_of}")]
    NoApplicableStructure {
        jurisdiction: String,
        as_of: NaiveDate,
    },

    #[error("grade {grade_level} step {step} is not in salary structure '{structure_name}'")]
    GradeStepNotFound {
        structure_id: Uuid,
        structure_name: String,
        grade_level: GradeCode,
        step: GradeCode,
    },
}

impl ResolutionMiss {
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionMiss::NoApplicableStructure { .. } => "NO_APPLICABLE_STRUCTURE",
            ResolutionMiss::GradeStepNotFound { .. } => "GRADE_STEP_NOT_FOUND",
        }
    }
}
