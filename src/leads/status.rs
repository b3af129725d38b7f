//! Lead status lifecycle values
//!
//! A lead moves between four enumerated states. Stored values outside the
//! enumeration normalize to `new` at read time; caller-supplied transition
//! targets are parsed strictly and rejected when unrecognized.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    InProgress,
    Contracted,
    Cancelled,
}

impl LeadStatus {
    /// All enumerated values, in listing order
    pub const ALL: [LeadStatus; 4] = [
        Self::New,
        Self::InProgress,
        Self::Contracted,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Contracted => "contracted",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether entering this status notifies the lead owner
    pub fn notifies_on_entry(&self) -> bool {
        matches!(self, Self::Contracted | Self::Cancelled)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strict parse for caller-supplied transition targets
impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "new" => Ok(Self::New),
            "in_progress" => Ok(Self::InProgress),
            "contracted" => Ok(Self::Contracted),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unrecognized lead status '{}'", other)),
        }
    }
}

// Read-time normalization: values stored outside the enumeration (legacy
// rows, manual edits) read back as `new` instead of failing the whole query.
impl<'de> Deserialize<'de> for LeadStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Self::New))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_parse() {
        assert_eq!("contracted".parse::<LeadStatus>(), Ok(LeadStatus::Contracted));
        assert_eq!("in_progress".parse::<LeadStatus>(), Ok(LeadStatus::InProgress));
        assert!("bogus".parse::<LeadStatus>().is_err());
        assert!("CONTRACTED".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_unknown_stored_value_normalizes_to_new() {
        let status: LeadStatus = serde_json::from_str(r#""pending-callback""#).unwrap();
        assert_eq!(status, LeadStatus::New);

        let status: LeadStatus = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(status, LeadStatus::Cancelled);
    }

    #[test]
    fn test_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&LeadStatus::InProgress).unwrap(),
            r#""in_progress""#
        );
    }

    #[test]
    fn test_notification_triggers() {
        assert!(LeadStatus::Contracted.notifies_on_entry());
        assert!(LeadStatus::Cancelled.notifies_on_entry());
        assert!(!LeadStatus::New.notifies_on_entry());
        assert!(!LeadStatus::InProgress.notifies_on_entry());
    }
}
