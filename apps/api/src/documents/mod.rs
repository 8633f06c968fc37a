// Document Reconciliation Unit
// Merges confidence-scored extraction guesses with human corrections into a
// verified document record, recording where each final value came from.

pub mod handlers;
pub mod reconcile;
pub mod review;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use reconcile::{parse_calendar_date, reconcile, ConfidenceBand};
pub use review::{confirm_document, ConfirmDocumentRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BirthRecord,
    AppointmentNotice,
    PromotionNotice,
    Confirmation,
    Certificate,
    IdentitySlip,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BirthRecord => "birth_record",
            DocumentType::AppointmentNotice => "appointment_notice",
            DocumentType::PromotionNotice => "promotion_notice",
            DocumentType::Confirmation => "confirmation",
            DocumentType::Certificate => "certificate",
            DocumentType::IdentitySlip => "identity_slip",
            DocumentType::Other => "other",
        }
    }

    /// The field whose uncorrected low-confidence value is an audit finding.
    pub fn primary_field(&self) -> FieldName {
        match self {
            DocumentType::IdentitySlip => FieldName::NationalId,
            _ => FieldName::Name,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birth_record" => Ok(DocumentType::BirthRecord),
            "appointment_notice" => Ok(DocumentType::AppointmentNotice),
            "promotion_notice" => Ok(DocumentType::PromotionNotice),
            "confirmation" => Ok(DocumentType::Confirmation),
            "certificate" => Ok(DocumentType::Certificate),
            "identity_slip" => Ok(DocumentType::IdentitySlip),
            "other" => Ok(DocumentType::Other),
            other => Err(format!("unknown document type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Name,
    Date,
    NationalId,
    Rank,
    Salary,
}

impl FieldName {
    pub const ALL: [FieldName; 5] = [
        FieldName::Name,
        FieldName::Date,
        FieldName::NationalId,
        FieldName::Rank,
        FieldName::Salary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::Date => "date",
            FieldName::NationalId => "national identity number",
            FieldName::Rank => "rank/grade",
            FieldName::Salary => "salary",
        }
    }
}

/// Type-dependent extras some extractors return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredFields {
    pub national_id: Option<String>,
    pub rank: Option<String>,
    pub salary: Option<String>,
}

/// What the external extraction capability hands back for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub name_guess: Option<String>,
    pub date_guess: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub structured_fields: StructuredFields,
}

impl ExtractionResult {
    pub fn guess(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::Name => self.name_guess.as_deref(),
            FieldName::Date => self.date_guess.as_deref(),
            FieldName::NationalId => self.structured_fields.national_id.as_deref(),
            FieldName::Rank => self.structured_fields.rank.as_deref(),
            FieldName::Salary => self.structured_fields.salary.as_deref(),
        }
    }
}

/// Values typed in by the reviewer. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanFields {
    pub name: Option<String>,
    pub date: Option<String>,
    pub national_id: Option<String>,
    pub rank: Option<String>,
    pub salary: Option<String>,
}

impl HumanFields {
    pub fn value(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::Name => self.name.as_deref(),
            FieldName::Date => self.date.as_deref(),
            FieldName::NationalId => self.national_id.as_deref(),
            FieldName::Rank => self.rank.as_deref(),
            FieldName::Salary => self.salary.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Extraction,
    Human,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledField {
    pub value: String,
    pub provenance: Provenance,
    /// The extractor's guess, kept even when a human overrode it.
    pub extracted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledDocument {
    pub document_id: Uuid,
    /// 1 for the first review; each later confirm appends the next revision.
    pub revision: i32,
    pub confidence: f64,
    pub band: ConfidenceBand,
    pub fields: BTreeMap<FieldName, ReconciledField>,
    pub warnings: Vec<String>,
    pub is_correction: bool,
    pub reviewed_at: DateTime<Utc>,
}

impl ReconciledDocument {
    pub fn field(&self, name: FieldName) -> Option<&ReconciledField> {
        self.fields.get(&name)
    }

    /// The final date field as a calendar date, if it parses.
    pub fn date_value(&self) -> Option<NaiveDate> {
        self.field(FieldName::Date)
            .and_then(|f| parse_calendar_date(&f.value))
    }
}

/// A document as the engine sees it: ownership, type, and its latest review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub document_type: DocumentType,
    pub storage_ref: Option<String>,
    pub review: Option<ReconciledDocument>,
}
