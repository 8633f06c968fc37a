//! Capabilities handed to the engine's entry points.
//!
//! Authentication and role assignment happen upstream; the gateway forwards the
//! caller's role in `x-registry-role`. The HTTP layer reads it exactly once and
//! passes the resulting `Capability` into the core, which only checks it.

use std::fmt;
use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const ROLE_HEADER: &str = "x-registry-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read-only: salary lookups and flag reads.
    Viewer = 0,
    /// Records career actions and reviews documents.
    Clerk = 1,
    /// Imports pay scales.
    Administrator = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ResolveSalary,
    ReadAuditFlag,
    RecordCareerAction,
    ConfirmDocument,
    ExtractDocument,
    ImportSalaryStructure,
}

impl Operation {
    pub fn required(self) -> Capability {
        match self {
            Operation::ResolveSalary | Operation::ReadAuditFlag => Capability::Viewer,
            Operation::RecordCareerAction
            | Operation::ConfirmDocument
            | Operation::ExtractDocument => Capability::Clerk,
            Operation::ImportSalaryStructure => Capability::Administrator,
        }
    }
}

impl Capability {
    pub fn allows(self, operation: Operation) -> bool {
        self >= operation.required()
    }

    pub fn require(self, operation: Operation) -> Result<(), AppError> {
        if self.allows(operation) {
            Ok(())
        } else {
            tracing::warn!(capability = %self, ?operation, "operation denied");
            Err(AppError::Forbidden)
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Viewer => write!(f, "viewer"),
            Capability::Clerk => write!(f, "clerk"),
            Capability::Administrator => write!(f, "administrator"),
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Capability::Viewer),
            "clerk" => Ok(Capability::Clerk),
            "administrator" | "admin" => Ok(Capability::Administrator),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Capability {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        raw.parse().map_err(|_| AppError::Forbidden)
    }
}
