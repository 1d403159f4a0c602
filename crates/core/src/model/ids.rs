use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Code a student enters to open an exam (an original exam or one of its versions).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExamCode(String);

impl ExamCode {
    /// Creates an `ExamCode`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the code is blank.
    pub fn new(code: impl Into<String>) -> Result<Self, ParseIdError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError::new("ExamCode"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExamCode {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExamCode> for String {
    fn from(code: ExamCode) -> Self {
        code.0
    }
}

/// Label of a multiple-choice option, e.g. `"A"`.
///
/// Labels are trimmed on construction. Whether a label is valid depends on the
/// question it is used with, so no further validation happens here.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionLabel(String);

impl OptionLabel {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.len() == label.len() {
            Self(label)
        } else {
            Self(trimmed.to_owned())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for OptionLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OptionLabel {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Server-issued identifier of a graded submission.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultId(Uuid);

impl ResultId {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for ExamCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExamCode({})", self.0)
    }
}

impl fmt::Debug for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionLabel({})", self.0)
    }
}

impl fmt::Debug for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for ExamCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an identifier from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl ParseIdError {
    fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ExamCode {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for ResultId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseIdError::new("ResultId"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_code_is_trimmed_and_rejects_blank() {
        let code: ExamCode = "  EXAM-42 ".parse().unwrap();
        assert_eq!(code.as_str(), "EXAM-42");
        assert!(ExamCode::new("   ").is_err());
    }

    #[test]
    fn exam_code_deserialization_validates() {
        let ok: ExamCode = serde_json::from_str("\"ABC123\"").unwrap();
        assert_eq!(ok.to_string(), "ABC123");
        assert!(serde_json::from_str::<ExamCode>("\"  \"").is_err());
    }

    #[test]
    fn option_label_trims_input() {
        assert_eq!(OptionLabel::from(" B ").as_str(), "B");
        assert_eq!(OptionLabel::from("C"), OptionLabel::new(String::from("C")));
    }

    #[test]
    fn result_id_parses_uuid() {
        let raw = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let id: ResultId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!("not-a-uuid".parse::<ResultId>().is_err());
    }
}
