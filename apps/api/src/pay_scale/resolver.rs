//! Salary resolution.
//!
//! # Selection
//! Candidates are the jurisdiction's structures effective on or before the
//! as-of date. A structure scoped to the requested cadre wins if one exists;
//! otherwise the jurisdiction default; otherwise the latest jurisdiction-wide
//! structure. Within each tier the latest effective date wins, ties broken by
//! name then id so the choice never depends on load order.
//!
//! Lookup inside the chosen structure is an exact (grade, step) match on
//! normalized codes.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::access::{Capability, Operation};
use crate::errors::AppError;
use crate::pay_scale::{GradeCode, ResolutionMiss, ResolvedPay, SalaryStructure};
use crate::store::EngineStore;

#[derive(Debug, Clone, Deserialize)]
pub struct PayQuery {
    pub jurisdiction: String,
    pub cadre: Option<String>,
    pub grade_level: GradeCode,
    pub step: GradeCode,
    pub as_of: NaiveDate,
}

/// Picks the structure that governs (jurisdiction, cadre) on `as_of`.
pub fn select_structure<'a>(
    structures: &'a [SalaryStructure],
    jurisdiction: &str,
    cadre: Option<&str>,
    as_of: NaiveDate,
) -> Option<&'a SalaryStructure> {
    let candidates = move || {
        structures.iter().filter(move |s| {
            s.jurisdiction_code.eq_ignore_ascii_case(jurisdiction) && s.effective_date <= as_of
        })
    };

    if let Some(cadre) = cadre {
        let cadre_specific = candidates()
            .filter(|s| {
                s.cadre_code
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(cadre))
            })
            .min_by(latest_first);
        if cadre_specific.is_some() {
            return cadre_specific;
        }
    }

    candidates()
        .filter(|s| s.is_default)
        .min_by(latest_first)
        .or_else(|| {
            candidates()
                .filter(|s| s.cadre_code.is_none())
                .min_by(latest_first)
        })
}

fn latest_first(a: &&SalaryStructure, b: &&SalaryStructure) -> Ordering {
    b.effective_date
        .cmp(&a.effective_date)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Pure lookup over an already-loaded set of structures.
pub fn resolve(structures: &[SalaryStructure], query: &PayQuery) -> Result<ResolvedPay, ResolutionMiss> {
    let structure = select_structure(
        structures,
        &query.jurisdiction,
        query.cadre.as_deref(),
        query.as_of,
    )
    .ok_or_else(|| ResolutionMiss::NoApplicableStructure {
        jurisdiction: query.jurisdiction.clone(),
        as_of: query.as_of,
    })?;

    let row = structure
        .row(query.grade_level, query.step)
        .ok_or_else(|| ResolutionMiss::GradeStepNotFound {
            structure_id: structure.id,
            structure_name: structure.name.clone(),
            grade_level: query.grade_level,
            step: query.step,
        })?;

    Ok(ResolvedPay {
        structure_id: structure.id,
        structure_name: structure.name.clone(),
        effective_date: structure.effective_date,
        grade_level: row.grade_level,
        step: row.step,
        amounts: row.amounts,
    })
}

/// `resolveSalary` entry point.
pub async fn resolve_salary(
    store: &dyn EngineStore,
    capability: Capability,
    query: &PayQuery,
) -> Result<ResolvedPay, AppError> {
    capability.require(Operation::ResolveSalary)?;

    let structures = store.load_pay_scales(&query.jurisdiction).await?;
    match resolve(&structures, query) {
        Ok(pay) => {
            debug!(
                jurisdiction = %query.jurisdiction,
                structure = %pay.structure_name,
                grade = %pay.grade_level,
                step = %pay.step,
                "salary resolved"
            );
            Ok(pay)
        }
        Err(miss) => {
            warn!(code = miss.code(), "salary resolution miss: {miss}");
            Err(miss.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::pay_scale::{GradeRow, PayAmounts};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn code(s: &str) -> GradeCode {
        s.parse().unwrap()
    }

    fn structure(
        name: &str,
        cadre: Option<&str>,
        effective: NaiveDate,
        is_default: bool,
        rows: &[(&str, &str, i64)],
    ) -> SalaryStructure {
        SalaryStructure {
            id: Uuid::new_v4(),
            jurisdiction_code: "EB".to_string(),
            cadre_code: cadre.map(String::from),
            name: name.to_string(),
            effective_date: effective,
            is_default,
            rows: rows
                .iter()
                .map(|(g, s, basic)| GradeRow {
                    grade_level: code(g),
                    step: code(s),
                    amounts: PayAmounts {
                        basic: *basic,
                        gross: basic + basic / 5,
                        net: basic - basic / 10,
                    },
                })
                .collect(),
        }
    }

    fn query(cadre: Option<&str>, grade: &str, step: &str, as_of: NaiveDate) -> PayQuery {
        PayQuery {
            jurisdiction: "EB".to_string(),
            cadre: cadre.map(String::from),
            grade_level: code(grade),
            step: code(step),
            as_of,
        }
    }

    #[test]
    fn test_latest_effective_structure_wins() {
        let structures = vec![
            structure("CONPSS-2019", None, date(2019, 1, 1), true, &[("08", "01", 100_000)]),
            structure("CONPSS-2024", None, date(2024, 1, 1), true, &[("08", "01", 150_000)]),
        ];
        let pay = resolve(&structures, &query(None, "8", "1", date(2024, 6, 1))).unwrap();
        assert_eq!(pay.structure_name, "CONPSS-2024");
        assert_eq!(pay.amounts.basic, 150_000);
    }

    #[test]
    fn test_future_structure_is_ignored() {
        let structures = vec![
            structure("CONPSS-2019", None, date(2019, 1, 1), true, &[("08", "01", 100_000)]),
            structure("CONPSS-2024", None, date(2024, 1, 1), true, &[("08", "01", 150_000)]),
        ];
        let pay = resolve(&structures, &query(None, "08", "01", date(2023, 12, 31))).unwrap();
        assert_eq!(pay.structure_name, "CONPSS-2019");
    }

    #[test]
    fn test_cadre_specific_structure_preferred() {
        let structures = vec![
            structure("CONPSS-2024", None, date(2024, 1, 1), true, &[("08", "01", 150_000)]),
            structure("CONHESS-2022", Some("HEALTH"), date(2022, 1, 1), false, &[("08", "01", 170_000)]),
        ];
        let pay = resolve(&structures, &query(Some("health"), "08", "01", date(2024, 6, 1))).unwrap();
        assert_eq!(pay.structure_name, "CONHESS-2022");
    }

    #[test]
    fn test_missing_cadre_structure_falls_back_to_default() {
        let structures = vec![
            structure("CONPSS-2024", None, date(2024, 1, 1), true, &[("08", "01", 150_000)]),
            structure("CONHESS-2022", Some("HEALTH"), date(2022, 1, 1), false, &[("08", "01", 170_000)]),
        ];
        let pay = resolve(&structures, &query(Some("EDUCATION"), "08", "01", date(2024, 6, 1))).unwrap();
        assert_eq!(pay.structure_name, "CONPSS-2024");
    }

    #[test]
    fn test_no_default_falls_back_to_jurisdiction_wide() {
        let structures = vec![structure("EB-2021", None, date(2021, 1, 1), false, &[("04", "02", 60_000)])];
        let pay = resolve(&structures, &query(None, "04", "02", date(2022, 1, 1))).unwrap();
        assert_eq!(pay.structure_name, "EB-2021");
    }

    #[test]
    fn test_no_structure_before_date() {
        let structures = vec![structure("CONPSS-2024", None, date(2024, 1, 1), true, &[("08", "01", 1)])];
        let miss = resolve(&structures, &query(None, "08", "01", date(2020, 1, 1))).unwrap_err();
        assert!(matches!(miss, ResolutionMiss::NoApplicableStructure { .. }));
        assert_eq!(miss.code(), "NO_APPLICABLE_STRUCTURE");
    }

    #[test]
    fn test_other_jurisdiction_is_not_applicable() {
        let mut other = structure("KN-2024", None, date(2024, 1, 1), true, &[("08", "01", 1)]);
        other.jurisdiction_code = "KN".to_string();
        let miss = resolve(&[other], &query(None, "08", "01", date(2024, 6, 1))).unwrap_err();
        assert!(matches!(miss, ResolutionMiss::NoApplicableStructure { .. }));
    }

    #[test]
    fn test_grade_step_not_found() {
        let structures = vec![structure("CONPSS-2024", None, date(2024, 1, 1), true, &[("15", "01", 1)])];
        let miss = resolve(&structures, &query(None, "16", "01", date(2024, 6, 1))).unwrap_err();
        match miss {
            ResolutionMiss::GradeStepNotFound {
                structure_name,
                grade_level,
                ..
            } => {
                assert_eq!(structure_name, "CONPSS-2024");
                assert_eq!(grade_level.to_string(), "16");
            }
            other => panic!("expected GradeStepNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_same_date_tie_breaks_deterministically() {
        let a = structure("B-SCALE", None, date(2024, 1, 1), true, &[("08", "01", 2)]);
        let b = structure("A-SCALE", None, date(2024, 1, 1), true, &[("08", "01", 1)]);
        let forward = resolve(&[a.clone(), b.clone()], &query(None, "08", "01", date(2024, 2, 1))).unwrap();
        let backward = resolve(&[b, a], &query(None, "08", "01", date(2024, 2, 1))).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.structure_name, "A-SCALE");
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let structures = vec![structure("CONPSS-2024", None, date(2024, 1, 1), true, &[("08", "01", 150_000)])];
        let q = query(None, "08", "01", date(2024, 6, 1));
        assert_eq!(resolve(&structures, &q), resolve(&structures, &q));
    }
}
