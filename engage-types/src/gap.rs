//! Gap lifecycle enums and the gap-ID wrapper.
//!
//! Gap IDs arriving from the model are stringly typed and ambiguous between
//! a gap's primary ID and its short ID. [`GapRef`] owns that ambiguity so
//! every call site resolves it the same way.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a tracked gap, ordered most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks spec generation until closed.
    Blocking,
    /// Should be resolved but does not block.
    High,
    /// Medium severity.
    Medium,
    /// Low severity.
    Low,
}

impl Severity {
    /// Parse case-insensitively, trimming surrounding whitespace.
    ///
    /// `"MEDIUM"`, `" Medium "`, and `"medium"` all yield [`Severity::Medium`].
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blocking" => Some(Self::Blocking),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocking => "blocking",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Who should answer a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Respondent {
    /// The issue reporter.
    Reporter,
    /// One of the issue's assignees.
    Assignee,
}

impl Respondent {
    /// Parse case-insensitively, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reporter" => Some(Self::Reporter),
            "assignee" => Some(Self::Assignee),
            _ => None,
        }
    }
}

/// Status in the gap lifecycle.
///
/// Transitions: created -> `Pending` (if requested) else `Open`;
/// `Pending -> Open` via `ask`; `Open | Pending -> Resolved` via close with
/// reason `answered`/`inferred`; `Open | Pending -> Skipped` via close with
/// reason `not_relevant`. A closed gap is never reopened implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapStatus {
    /// Created but not yet asked of a human.
    Pending,
    /// Asked and awaiting an answer.
    Open,
    /// Closed with an answer (or an inferred one).
    Resolved,
    /// Closed as not relevant.
    Skipped,
}

/// Reason a gap was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A human answered the question.
    Answered,
    /// The bot inferred the answer from code or context.
    Inferred,
    /// The question turned out not to matter.
    NotRelevant,
}

impl CloseReason {
    /// Parse case-insensitively, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "answered" => Some(Self::Answered),
            "inferred" => Some(Self::Inferred),
            "not_relevant" | "not relevant" => Some(Self::NotRelevant),
            _ => None,
        }
    }

    /// The resulting [`GapStatus`] when a gap is closed for this reason.
    pub fn resulting_status(self) -> GapStatus {
        match self {
            Self::Answered | Self::Inferred => GapStatus::Resolved,
            Self::NotRelevant => GapStatus::Skipped,
        }
    }

    /// Whether closing with this reason requires a non-empty note.
    pub fn requires_note(self) -> bool {
        matches!(self, Self::Answered | Self::Inferred)
    }
}

/// A gap reference as it arrives from model output: either a JSON string or
/// number, optionally prefixed with `gap ` or `Gap `.
///
/// Resolution against the store tries the primary ID first, then the short
/// ID (see `engage-core`'s gap store; the tiebreaker is documented there).
/// This wrapper only owns *parsing*, not store resolution, so it has no
/// dependency on any store trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapRef {
    digits: String,
}

impl GapRef {
    /// Parse a raw string form, stripping a leading `gap `/`Gap ` prefix and
    /// surrounding whitespace. Returns `None` if what remains isn't a valid
    /// non-negative integer.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("gap ")
            .or_else(|| trimmed.strip_prefix("Gap "))
            .unwrap_or(trimmed)
            .trim();
        if stripped.is_empty() || !stripped.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            digits: stripped.to_string(),
        })
    }

    /// Parse from a JSON number or string.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) if n.is_u64() || n.is_i64() => {
                Some(Self::parse(&n.to_string())?)
            }
            _ => None,
        }
    }

    /// The parsed digits as an `i64`. Parsing already guarantees this
    /// succeeds (ASCII digits only, no sign).
    pub fn as_i64(&self) -> i64 {
        self.digits.parse().expect("GapRef digits are validated on parse")
    }
}

impl fmt::Display for GapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digits)
    }
}

impl Serialize for GapRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.digits)
    }
}

impl<'de> Deserialize<'de> for GapRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom("invalid gap id: expected digits"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_case_insensitive() {
        assert_eq!(Severity::parse("MEDIUM"), Some(Severity::Medium));
        assert_eq!(Severity::parse(" Medium "), Some(Severity::Medium));
        assert_eq!(Severity::parse("medium"), Some(Severity::Medium));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn severity_ordering_is_urgency() {
        assert!(Severity::Blocking < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
    }

    #[test]
    fn respondent_case_insensitive() {
        assert_eq!(Respondent::parse("ASSIGNEE"), Some(Respondent::Assignee));
        assert_eq!(Respondent::parse("reporter"), Some(Respondent::Reporter));
        assert_eq!(Respondent::parse("nope"), None);
    }

    #[test]
    fn close_reason_maps_to_status() {
        assert_eq!(CloseReason::Answered.resulting_status(), GapStatus::Resolved);
        assert_eq!(CloseReason::Inferred.resulting_status(), GapStatus::Resolved);
        assert_eq!(CloseReason::NotRelevant.resulting_status(), GapStatus::Skipped);
        assert!(CloseReason::Answered.requires_note());
        assert!(CloseReason::Inferred.requires_note());
        assert!(!CloseReason::NotRelevant.requires_note());
    }

    #[test]
    fn gap_ref_polymorphism() {
        // decimal(g.id), decimal(g.short_id), "gap " + short, "Gap " + id
        assert_eq!(GapRef::parse("42").unwrap().as_i64(), 42);
        assert_eq!(GapRef::parse("7").unwrap().as_i64(), 7);
        assert_eq!(GapRef::parse("gap 7").unwrap().as_i64(), 7);
        assert_eq!(GapRef::parse("Gap 42").unwrap().as_i64(), 42);
    }

    #[test]
    fn gap_ref_rejects_non_numeric() {
        assert!(GapRef::parse("gap abc").is_none());
        assert!(GapRef::parse("").is_none());
        assert!(GapRef::parse("gap ").is_none());
    }

    #[test]
    fn gap_ref_from_json_number_and_string() {
        assert_eq!(
            GapRef::from_json(&serde_json::json!(42)).unwrap().as_i64(),
            42
        );
        assert_eq!(
            GapRef::from_json(&serde_json::json!("gap 7"))
                .unwrap()
                .as_i64(),
            7
        );
        assert!(GapRef::from_json(&serde_json::json!(null)).is_none());
    }

    #[test]
    fn gap_ref_serde_roundtrip() {
        let g = GapRef::parse("123").unwrap();
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json, serde_json::json!("123"));
        let back: GapRef = serde_json::from_value(json).unwrap();
        assert_eq!(g, back);
    }

    #[test]
    fn gap_ref_deserialize_from_number() {
        let back: GapRef = serde_json::from_value(serde_json::json!(9)).unwrap();
        assert_eq!(back.as_i64(), 9);
    }
}
