//! Grade level / step codes.
//!
//! Pay tables are keyed by two-digit codes ("08", "15"). Inputs arrive in
//! every shape imaginable ("8", "08", "GL 08"), so everything is normalized
//! through `GradeCode` before it touches a lookup or a comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_CODE: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradeCodeError {
    #[error("grade/step code is empty")]
    Empty,

    #[error("'{0}' is not a numeric grade/step code")]
    NotNumeric(String),

    #[error("grade/step code '{0}' is outside 01..=99")]
    OutOfRange(String),
}

/// A normalized grade level or step. Ordering is numeric; display is two digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GradeCode(u8);

impl GradeCode {
    pub fn new(value: u8) -> Result<Self, GradeCodeError> {
        if value == 0 || value > MAX_CODE {
            return Err(GradeCodeError::OutOfRange(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl FromStr for GradeCode {
    type Err = GradeCodeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GradeCodeError::Empty);
        }

        // "GL08", "gl 8", "GL-08"
        let digits = match trimmed.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("gl") => {
                trimmed[2..].trim_start_matches([' ', '-'])
            }
            _ => trimmed,
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(GradeCodeError::NotNumeric(raw.to_string()));
        }

        let value: u32 = digits
            .trim_start_matches('0')
            .parse()
            .unwrap_or(0);
        if value == 0 || value > MAX_CODE as u32 {
            return Err(GradeCodeError::OutOfRange(raw.to_string()));
        }
        Ok(Self(value as u8))
    }
}

impl fmt::Display for GradeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<String> for GradeCode {
    type Error = GradeCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GradeCode> for String {
    fn from(code: GradeCode) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> GradeCode {
        s.parse().expect("valid grade code")
    }

    #[test]
    fn test_single_digit_is_padded() {
        assert_eq!(code("8").to_string(), "08");
    }

    #[test]
    fn test_padded_and_unpadded_are_equal() {
        assert_eq!(code("8"), code("08"));
        assert_eq!(code(" 08 "), code("8"));
    }

    #[test]
    fn test_gl_prefix_accepted() {
        assert_eq!(code("GL08"), code("8"));
        assert_eq!(code("gl 15"), code("15"));
        assert_eq!(code("GL-7"), code("07"));
    }

    #[test]
    fn test_ordering_is_numeric_not_lexical() {
        // Lexically "8" > "10"; numerically it is not.
        assert!(code("8") < code("10"));
        assert!(code("09") < code("16"));
    }

    #[test]
    fn test_rejects_zero_and_overflow() {
        assert_eq!("0".parse::<GradeCode>(), Err(GradeCodeError::OutOfRange("0".into())));
        assert!("100".parse::<GradeCode>().is_err());
        assert!(GradeCode::new(0).is_err());
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(matches!(
            "senior".parse::<GradeCode>(),
            Err(GradeCodeError::NotNumeric(_))
        ));
        assert_eq!("  ".parse::<GradeCode>(), Err(GradeCodeError::Empty));
    }

    #[test]
    fn test_serde_uses_two_digit_strings() {
        let json = serde_json::to_string(&code("7")).unwrap();
        assert_eq!(json, "\"07\"");
        let back: GradeCode = serde_json::from_str("\"GL 12\"").unwrap();
        assert_eq!(back, code("12"));
    }
}
