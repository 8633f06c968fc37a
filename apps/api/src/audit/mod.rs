// Audit Flag Evaluator
// A fixed battery of consistency rules over a worker's snapshot, ledger, and
// reconciled documents. The evaluator is pure; the ledger and document flows
// persist its output on the worker inside their own unit of work.

pub mod evaluator;
pub mod handlers;
pub mod refresh;
pub mod rules;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use evaluator::{evaluate, AuditInput};
pub use refresh::refresh_flag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Severity::None),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// The cached flag stored on a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuditFlag {
    pub severity: Severity,
    /// Concatenated finding descriptions in rule priority order; empty when unflagged.
    pub reason: String,
}

impl AuditFlag {
    pub fn is_flagged(&self) -> bool {
        self.severity > Severity::None
    }
}

/// What `getAuditFlag` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFlagView {
    pub worker_id: uuid::Uuid,
    pub severity: Severity,
    pub reason: String,
    pub flagged: bool,
    pub evaluated_at: Option<DateTime<Utc>>,
}
