//! Transition policy for career actions.
//!
//! Checks run in a fixed order and the first violation is returned:
//! 1. chronology: the effective date may not precede the latest recorded action
//! 2. direction: PROMOTION/ADVANCEMENT must raise the grade level, DEMOTION must lower it
//!
//! A worker with no current grade (never placed) has no direction constraint.

use chrono::NaiveDate;

use crate::career::{CareerActionKind, GradeDirection, LedgerError};
use crate::pay_scale::GradeCode;

pub fn check_chronology(
    latest_effective_date: Option<NaiveDate>,
    effective_date: NaiveDate,
) -> Result<(), LedgerError> {
    match latest_effective_date {
        Some(latest) if effective_date < latest => Err(LedgerError::OutOfOrderAction {
            effective_date,
            latest_effective_date: latest,
        }),
        _ => Ok(()),
    }
}

pub fn check_grade_direction(
    kind: CareerActionKind,
    current: Option<GradeCode>,
    destination: GradeCode,
) -> Result<(), LedgerError> {
    let Some(current) = current else {
        return Ok(());
    };
    let legal = match kind.direction() {
        GradeDirection::Up => destination > current,
        GradeDirection::Down => destination < current,
        GradeDirection::Unconstrained => true,
    };
    if legal {
        Ok(())
    } else {
        Err(LedgerError::IllegalGradeTransition {
            kind,
            from: current,
            to: destination,
        })
    }
}

/// Full policy, in order.
pub fn validate_transition(
    kind: CareerActionKind,
    effective_date: NaiveDate,
    destination: GradeCode,
    latest_effective_date: Option<NaiveDate>,
    current: Option<GradeCode>,
) -> Result<(), LedgerError> {
    check_chronology(latest_effective_date, effective_date)?;
    check_grade_direction(kind, current, destination)
}
