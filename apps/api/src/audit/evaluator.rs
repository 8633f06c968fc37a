use crate::audit::rules::{Finding, RULES};
use crate::audit::{AuditFlag, Severity};
use crate::career::CareerAction;
use crate::documents::DocumentRecord;
use crate::models::worker::Worker;
use crate::pay_scale::SalaryStructure;

const REASON_SEPARATOR: &str = "; ";

/// Everything the rule battery may look at. Nothing else is consulted.
#[derive(Debug, Clone, Copy)]
pub struct AuditInput<'a> {
    pub worker: &'a Worker,
    pub actions: &'a [CareerAction],
    pub documents: &'a [DocumentRecord],
    /// The structure governing the worker's current grade, if one applies.
    pub governing_structure: Option<&'a SalaryStructure>,
}

/// Runs every rule and returns the triggered findings in priority order.
pub fn findings(input: &AuditInput<'_>) -> Vec<Finding> {
    let mut found: Vec<Finding> = RULES.iter().filter_map(|rule| rule(input)).collect();
    found.sort_by_key(|f| f.kind);
    found
}

/// Pure, deterministic flag computation.
pub fn evaluate(input: &AuditInput<'_>) -> AuditFlag {
    summarize(&findings(input))
}

/// Highest severity wins; reasons are joined in priority order.
pub fn summarize(findings: &[Finding]) -> AuditFlag {
    let mut ordered: Vec<&Finding> = findings.iter().collect();
    ordered.sort_by_key(|f| f.kind);

    let severity = ordered
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(Severity::None);
    let reason = ordered
        .iter()
        .map(|f| f.description.as_str())
        .collect::<Vec<_>>()
        .join(REASON_SEPARATOR);

    AuditFlag { severity, reason }
}
