// Career Ledger
// Append-only history of career actions per worker. The ledger validates each
// transition against the worker's history, resolves the destination pay, and is
// the only writer of the worker's current snapshot.

pub mod handlers;
pub mod ledger;
pub mod transitions;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::pay_scale::{GradeCode, PayAmounts};

pub use ledger::{record_career_action, RecordActionRequest, RecordedAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareerActionKind {
    Promotion,
    Conversion,
    Advancement,
    Confirmation,
    Transfer,
    Demotion,
    Secondment,
    ActingAppointment,
    Probation,
    PermanentPensionable,
}

/// Required direction of the grade-level change for a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeDirection {
    Up,
    Down,
    Unconstrained,
}

impl CareerActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CareerActionKind::Promotion => "PROMOTION",
            CareerActionKind::Conversion => "CONVERSION",
            CareerActionKind::Advancement => "ADVANCEMENT",
            CareerActionKind::Confirmation => "CONFIRMATION",
            CareerActionKind::Transfer => "TRANSFER",
            CareerActionKind::Demotion => "DEMOTION",
            CareerActionKind::Secondment => "SECONDMENT",
            CareerActionKind::ActingAppointment => "ACTING_APPOINTMENT",
            CareerActionKind::Probation => "PROBATION",
            CareerActionKind::PermanentPensionable => "PERMANENT_PENSIONABLE",
        }
    }

    pub fn direction(&self) -> GradeDirection {
        match self {
            CareerActionKind::Promotion | CareerActionKind::Advancement => GradeDirection::Up,
            CareerActionKind::Demotion => GradeDirection::Down,
            _ => GradeDirection::Unconstrained,
        }
    }
}

impl fmt::Display for CareerActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CareerActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "PROMOTION" => CareerActionKind::Promotion,
            "CONVERSION" => CareerActionKind::Conversion,
            "ADVANCEMENT" => CareerActionKind::Advancement,
            "CONFIRMATION" => CareerActionKind::Confirmation,
            "TRANSFER" => CareerActionKind::Transfer,
            "DEMOTION" => CareerActionKind::Demotion,
            "SECONDMENT" => CareerActionKind::Secondment,
            "ACTING_APPOINTMENT" => CareerActionKind::ActingAppointment,
            "PROBATION" => CareerActionKind::Probation,
            "PERMANENT_PENSIONABLE" => CareerActionKind::PermanentPensionable,
            other => return Err(format!("unknown career action kind '{other}'")),
        };
        Ok(kind)
    }
}

/// Outcome of the pay lookup performed when the action was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayResolution {
    Resolved,
    GradeStepNotFound,
    NoApplicableStructure,
}

impl PayResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayResolution::Resolved => "resolved",
            PayResolution::GradeStepNotFound => "grade_step_not_found",
            PayResolution::NoApplicableStructure => "no_applicable_structure",
        }
    }
}

impl FromStr for PayResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolved" => Ok(PayResolution::Resolved),
            "grade_step_not_found" => Ok(PayResolution::GradeStepNotFound),
            "no_applicable_structure" => Ok(PayResolution::NoApplicableStructure),
            other => Err(format!("unknown pay resolution '{other}'")),
        }
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerAction {
    pub id: Uuid,
    pub worker_id: Uuid,
    /// Append position within the worker's ledger, starting at 1.
    pub sequence: i32,
    pub kind: CareerActionKind,
    pub effective_date: NaiveDate,
    pub grade_level: GradeCode,
    pub step: GradeCode,
    pub designation: String,
    /// Resolved at recording time and never recomputed. `None` when the lookup missed.
    pub compensation: Option<PayAmounts>,
    pub pay_resolution: PayResolution,
    pub salary_structure_id: Option<Uuid>,
    pub authority_reference: String,
    pub gazette_number: Option<String>,
    pub remarks: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(
        "effective date {effective_date} precedes the latest recorded action ({latest_effective_date})"
    )]
    OutOfOrderAction {
        effective_date: NaiveDate,
        latest_effective_date: NaiveDate,
    },

    #[error("{kind} from grade {from} to grade {to} is not allowed")]
    IllegalGradeTransition {
        kind: CareerActionKind,
        from: GradeCode,
        to: GradeCode,
    },

    #[error("destination pay could not be resolved: {0}")]
    UnresolvedCompensation(String),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::OutOfOrderAction { .. } => "OUT_OF_ORDER_ACTION",
            LedgerError::IllegalGradeTransition { .. } => "ILLEGAL_GRADE_TRANSITION",
            LedgerError::UnresolvedCompensation(_) => "UNRESOLVED_COMPENSATION",
        }
    }
}
