//! Shared session types

use serde::{Deserialize, Serialize};
use std::fmt;
use wand_sketch::Sketch;

/// Session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an externally chosen id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id
    #[must_use]
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Id as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One selectable reply offered alongside a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    /// Text shown to the user
    pub label: String,
    /// Text returned when chosen
    pub value: String,
}

impl ReplyOption {
    /// Create new option
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Option whose label doubles as its value
    #[inline]
    #[must_use]
    pub fn same(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            label: text.clone(),
            value: text,
        }
    }
}

/// What a presentation layer shows besides the conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    /// Current document, one entry per slot
    pub document: Vec<String>,
    /// Active sketches
    pub sketches: Vec<Sketch>,
    /// Per-slot highlight strength in `[0, 1]`
    pub highlight: Vec<f64>,
    /// Per-slot freeze flags
    pub freeze_mask: Vec<bool>,
    /// Remaining turns
    pub turns_left: i64,
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// User chose "Done"
    UserDone,
    /// Turn budget reached zero
    BudgetExhausted,
    /// Transport closed or session destroyed
    TransportClosed,
    /// No reply within the timeout
    ReplyTimeout,
    /// Loop could not continue after an internal error
    Aborted,
}

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier
    pub session_id: SessionId,
    /// Why it stopped
    pub reason: EndReason,
    /// Turns left at the end
    pub turns_left: i64,
    /// Turns consumed
    pub turns_used: i64,
    /// Turn records written
    pub records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_differ() {
        assert_ne!(SessionId::random(), SessionId::random());
    }

    #[test]
    fn session_id_serializes_as_string() {
        let id = SessionId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn end_reason_snake_case() {
        assert_eq!(
            serde_json::to_string(&EndReason::BudgetExhausted).unwrap(),
            "\"budget_exhausted\""
        );
    }
}
