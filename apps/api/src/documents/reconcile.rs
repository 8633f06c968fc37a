//! Field-level merge of extraction guesses and human corrections.
//!
//! # Merge rules
//! - Human value present and non-blank → it wins (provenance `Human`).
//! - Otherwise a non-blank extracted guess is used (provenance `Extraction`).
//! - Otherwise the field stays unset.
//!
//! Confidence never blocks a confirmation. It only picks a band and, when low,
//! adds a warning. Extraction warnings are carried through verbatim.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::documents::{
    ExtractionResult, FieldName, HumanFields, Provenance, ReconciledDocument, ReconciledField,
};
use crate::errors::AppError;

const HIGH_BAND_MIN: f64 = 0.8;
const MEDIUM_BAND_FLOOR: f64 = 0.5;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d %B %Y", "%d %b %Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }

    pub fn from_score(confidence: f64) -> Self {
        match confidence {
            c if c >= HIGH_BAND_MIN => ConfidenceBand::High,
            c if c > MEDIUM_BAND_FLOOR => ConfidenceBand::Medium,
            _ => ConfidenceBand::Low,
        }
    }
}

impl FromStr for ConfidenceBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(ConfidenceBand::High),
            "medium" => Ok(ConfidenceBand::Medium),
            "low" => Ok(ConfidenceBand::Low),
            other => Err(format!("unknown confidence band '{other}'")),
        }
    }
}

/// Rejects payloads the extractor should never have produced.
pub fn validate_extraction(extraction: &ExtractionResult) -> Result<(), AppError> {
    let c = extraction.confidence;
    if !c.is_finite() || !(0.0..=1.0).contains(&c) {
        return Err(AppError::InconsistentInput(format!(
            "extraction confidence must be within [0, 1], got {c}"
        )));
    }
    Ok(())
}

/// Builds one review revision of a document.
pub fn reconcile(
    document_id: Uuid,
    revision: i32,
    human: &HumanFields,
    extraction: &ExtractionResult,
    reviewed_at: DateTime<Utc>,
) -> Result<ReconciledDocument, AppError> {
    validate_extraction(extraction)?;

    let band = ConfidenceBand::from_score(extraction.confidence);
    let mut warnings = extraction.warnings.clone();
    if band == ConfidenceBand::Low {
        warnings.push(format!(
            "extraction confidence {:.2} is low; verify every field against the source",
            extraction.confidence
        ));
    }

    let mut fields = BTreeMap::new();
    for name in FieldName::ALL {
        let extracted = non_blank(extraction.guess(name));
        let entered = non_blank(human.value(name));

        let field = match (entered, extracted) {
            (Some(value), extracted) => {
                if let Some(guess) = extracted {
                    if !same_value(value, guess) {
                        warnings.push(format!(
                            "{}: reviewer value '{value}' overrides extracted '{guess}'",
                            name.label()
                        ));
                    }
                }
                ReconciledField {
                    value: value.to_string(),
                    provenance: Provenance::Human,
                    extracted: extracted.map(str::to_string),
                }
            }
            (None, Some(guess)) => ReconciledField {
                value: guess.to_string(),
                provenance: Provenance::Extraction,
                extracted: Some(guess.to_string()),
            },
            (None, None) => continue,
        };
        fields.insert(name, field);
    }

    if let Some(date) = fields.get(&FieldName::Date) {
        if parse_calendar_date(&date.value).is_none() {
            warnings.push(format!(
                "date: '{}' is not a recognizable calendar date",
                date.value
            ));
        }
    }

    Ok(ReconciledDocument {
        document_id,
        revision,
        confidence: extraction.confidence,
        band,
        fields,
        warnings,
        is_correction: revision > 1,
        reviewed_at,
    })
}

/// Parses the date shapes seen on civil-service paperwork.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn same_value(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    normalize(a).eq_ignore_ascii_case(&normalize(b))
}
