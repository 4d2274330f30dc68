//! Interaction units
//!
//! A unit is one thing the user (or the wand) can do in a turn. Every unit
//! implements the flat [`Communication`] capability set; shared behaviour
//! such as the first-time introduction and critic highlighting lives in
//! [`helpers`] and is used by composition.
//!
//! Units keep no per-session fields. Anything they need to remember goes
//! into session state so that undo covers it.

mod elaboration;
mod general;
pub mod helpers;
mod reflection;

pub use elaboration::{
    ClearControls, LetWandWrite, ReplaceSentence, SentenceSuggestion, TopicControl,
    TopicSuggestion,
};
pub use general::{Echo, Feedback, OpeningMessage, Undo};
pub use reflection::{HighLevelTip, OffTopicCheck, QualityTip, ReflectTogether};

use crate::error::{ConfigError, SessionError};
use crate::session::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Capability set every interaction unit provides
#[async_trait]
pub trait Communication: Send + Sync {
    /// Menu text; also the default sort key
    fn description(&self) -> &str;

    /// Classification used by tag filtering
    fn tags(&self) -> &[UnitTag] {
        &[]
    }

    /// Whether the unit may be offered now
    fn can_activate(&self, session: &Session) -> bool;

    /// `> 0` means the unit wants to interrupt before the menu
    fn confidence_to_interrupt(&self, _session: &Session) -> f64 {
        0.0
    }

    /// Run the unit
    ///
    /// Returns `false` when nothing meaningful happened, which refunds the
    /// turn.
    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError>;
}

/// Unit classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitTag {
    /// Session plumbing
    General,
    /// Driven by user input
    Human,
    /// Driven by the wand
    Agent,
    /// Adds or changes content
    Elaboration,
    /// Comments on content
    Reflection,
    /// Acts on the whole story
    Global,
    /// Acts on one sentence
    Local,
}

/// Built-in unit identifiers, as used in presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// [`OpeningMessage`]
    OpeningMessage,
    /// [`Echo`]
    Echo,
    /// [`Feedback`]
    Feedback,
    /// [`Undo`]
    Undo,
    /// [`TopicControl`]
    TopicControl,
    /// [`TopicSuggestion`]
    TopicSuggestion,
    /// [`SentenceSuggestion`]
    SentenceSuggestion,
    /// [`ReplaceSentence`]
    ReplaceSentence,
    /// [`LetWandWrite`]
    LetWandWrite,
    /// [`ClearControls`]
    ClearControls,
    /// [`ReflectTogether`]
    ReflectTogether,
    /// [`QualityTip`]
    QualityTip,
    /// [`HighLevelTip`]
    HighLevelTip,
    /// [`OffTopicCheck`]
    OffTopicCheck,
}

impl UnitKind {
    /// Every built-in unit, in registration order
    pub const ALL: [UnitKind; 14] = [
        UnitKind::OpeningMessage,
        UnitKind::Echo,
        UnitKind::Feedback,
        UnitKind::Undo,
        UnitKind::TopicControl,
        UnitKind::TopicSuggestion,
        UnitKind::SentenceSuggestion,
        UnitKind::ReplaceSentence,
        UnitKind::LetWandWrite,
        UnitKind::ClearControls,
        UnitKind::ReflectTogether,
        UnitKind::QualityTip,
        UnitKind::HighLevelTip,
        UnitKind::OffTopicCheck,
    ];

    /// Preset and config name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::OpeningMessage => "opening_message",
            Self::Echo => "echo",
            Self::Feedback => "feedback",
            Self::Undo => "undo",
            Self::TopicControl => "topic_control",
            Self::TopicSuggestion => "topic_suggestion",
            Self::SentenceSuggestion => "sentence_suggestion",
            Self::ReplaceSentence => "replace_sentence",
            Self::LetWandWrite => "let_wand_write",
            Self::ClearControls => "clear_controls",
            Self::ReflectTogether => "reflect_together",
            Self::QualityTip => "quality_tip",
            Self::HighLevelTip => "high_level_tip",
            Self::OffTopicCheck => "off_topic_check",
        }
    }

    /// Construct the unit
    #[must_use]
    pub fn build(self) -> Arc<dyn Communication> {
        match self {
            Self::OpeningMessage => Arc::new(OpeningMessage::default()),
            Self::Echo => Arc::new(Echo),
            Self::Feedback => Arc::new(Feedback::default()),
            Self::Undo => Arc::new(Undo),
            Self::TopicControl => Arc::new(TopicControl),
            Self::TopicSuggestion => Arc::new(TopicSuggestion::default()),
            Self::SentenceSuggestion => Arc::new(SentenceSuggestion::default()),
            Self::ReplaceSentence => Arc::new(ReplaceSentence),
            Self::LetWandWrite => Arc::new(LetWandWrite),
            Self::ClearControls => Arc::new(ClearControls),
            Self::ReflectTogether => Arc::new(ReflectTogether),
            Self::QualityTip => Arc::new(QualityTip::default()),
            Self::HighLevelTip => Arc::new(HighLevelTip::default()),
            Self::OffTopicCheck => Arc::new(OffTopicCheck),
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown unit: {s}")))
    }
}

/// Units registered by a named preset
///
/// - `full`: every built-in unit
/// - `study`: the set used in user studies, without opening message and echo
///
/// # Errors
/// `ConfigError::UnknownPreset`.
pub fn preset(name: &str) -> Result<Vec<UnitKind>, ConfigError> {
    use UnitKind::*;
    match name {
        "full" => Ok(UnitKind::ALL.to_vec()),
        "study" => Ok(vec![
            Undo,
            TopicControl,
            TopicSuggestion,
            SentenceSuggestion,
            ReplaceSentence,
            LetWandWrite,
            ReflectTogether,
            QualityTip,
            HighLevelTip,
            OffTopicCheck,
            Feedback,
        ]),
        other => Err(ConfigError::UnknownPreset(other.to_string())),
    }
}

/// Keep units carrying at least one of `tags`; untagged units are dropped
#[must_use]
pub fn filter_by_tags(
    units: Vec<Arc<dyn Communication>>,
    tags: &[UnitTag],
) -> Vec<Arc<dyn Communication>> {
    units
        .into_iter()
        .filter(|u| u.tags().iter().any(|t| tags.contains(t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for kind in UnitKind::ALL {
            assert_eq!(kind.name().parse::<UnitKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.name())
            );
        }
        assert!("nope".parse::<UnitKind>().is_err());
    }

    #[test]
    fn presets() {
        assert_eq!(preset("full").unwrap().len(), 14);
        let study = preset("study").unwrap();
        assert_eq!(study.len(), 11);
        assert!(!study.contains(&UnitKind::Echo));
        assert!(matches!(
            preset("s9"),
            Err(ConfigError::UnknownPreset(name)) if name == "s9"
        ));
    }

    #[test]
    fn descriptions_are_unique() {
        let mut seen: Vec<String> = UnitKind::ALL
            .iter()
            .map(|k| k.build().description().to_string())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), UnitKind::ALL.len());
    }

    #[test]
    fn tag_filter_is_or_and_skips_untagged() {
        let units: Vec<_> = UnitKind::ALL.iter().map(|k| k.build()).collect();
        let kept = filter_by_tags(units, &[UnitTag::Local, UnitTag::General]);
        let names: Vec<&str> = kept.iter().map(|u| u.description()).collect();
        assert!(names.contains(&"Undo."));
        assert!(names.contains(&"Replace a sentence."));
        assert!(!names.contains(&"Let Creative Wand repeat what you tell them."));
        assert!(!names.contains(&"Apply topic control."));
    }
}
