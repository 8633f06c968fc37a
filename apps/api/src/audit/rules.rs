//! The rule battery. Each rule looks at the whole input and yields at most one finding.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditInput, Severity};
use crate::career::PayResolution;
use crate::documents::{DocumentType, Provenance};

/// Findings below this confidence with an uncorrected primary field are reported.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Declaration order is rule priority; it fixes the order of the reason text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    BirthDateConflict,
    PayScaleGap,
    LowConfidenceDocument,
    OverScale,
}

impl FindingKind {
    pub fn severity(&self) -> Severity {
        match self {
            FindingKind::BirthDateConflict => Severity::High,
            FindingKind::PayScaleGap => Severity::Medium,
            FindingKind::LowConfidenceDocument => Severity::Medium,
            FindingKind::OverScale => Severity::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub description: String,
}

impl Finding {
    fn new(kind: FindingKind, description: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            description,
        }
    }
}

pub type Rule = fn(&AuditInput<'_>) -> Option<Finding>;

pub const RULES: &[Rule] = &[
    birth_date_conflict,
    pay_scale_gap,
    low_confidence_document,
    over_scale,
];

/// Declared date of birth differs from a reviewed birth record's date.
pub fn birth_date_conflict(input: &AuditInput<'_>) -> Option<Finding> {
    let declared = input.worker.date_of_birth?;

    let mut conflicting: Vec<_> = input
        .documents
        .iter()
        .filter(|d| d.document_type == DocumentType::BirthRecord)
        .filter_map(|d| d.review.as_ref()?.date_value())
        .filter(|date| *date != declared)
        .collect();
    if conflicting.is_empty() {
        return None;
    }
    conflicting.sort();
    conflicting.dedup();

    let dates = conflicting
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Some(Finding::new(
        FindingKind::BirthDateConflict,
        format!("declared date of birth {declared} conflicts with birth record date {dates}"),
    ))
}

/// Career actions whose destination grade/step was missing from the governing pay scale.
pub fn pay_scale_gap(input: &AuditInput<'_>) -> Option<Finding> {
    let gaps: Vec<_> = input
        .actions
        .iter()
        .filter(|a| a.pay_resolution == PayResolution::GradeStepNotFound)
        .map(|a| {
            format!(
                "{} to GL{}/{} on {}",
                a.kind, a.grade_level, a.step, a.effective_date
            )
        })
        .collect();
    if gaps.is_empty() {
        return None;
    }
    Some(Finding::new(
        FindingKind::PayScaleGap,
        format!(
            "{} career action(s) reference a grade/step absent from the pay scale ({})",
            gaps.len(),
            gaps.join(", ")
        ),
    ))
}

/// Documents confirmed at low confidence whose primary field nobody corrected.
pub fn low_confidence_document(input: &AuditInput<'_>) -> Option<Finding> {
    let weak: Vec<_> = input
        .documents
        .iter()
        .filter_map(|d| {
            let review = d.review.as_ref()?;
            if review.confidence >= LOW_CONFIDENCE_THRESHOLD {
                return None;
            }
            let primary = d.document_type.primary_field();
            let corrected = review
                .field(primary)
                .is_some_and(|f| f.provenance == Provenance::Human);
            if corrected {
                return None;
            }
            Some(format!(
                "{} ({:.2}, uncorrected {})",
                d.document_type,
                review.confidence,
                primary.label()
            ))
        })
        .collect();
    if weak.is_empty() {
        return None;
    }
    Some(Finding::new(
        FindingKind::LowConfidenceDocument,
        format!(
            "{} document(s) confirmed at low confidence without review of the primary field: {}",
            weak.len(),
            weak.join(", ")
        ),
    ))
}

/// Current grade above the top of the governing pay structure.
pub fn over_scale(input: &AuditInput<'_>) -> Option<Finding> {
    let grade = input.worker.snapshot.grade_level?;
    let structure = input.governing_structure?;
    let max = structure.max_grade_level()?;
    if grade <= max {
        return None;
    }
    Some(Finding::new(
        FindingKind::OverScale,
        format!(
            "current grade {grade} exceeds the maximum grade {max} in salary structure '{}'",
            structure.name
        ),
    ))
}
