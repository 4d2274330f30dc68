//! Session state keys and typed readers for the story layout

use crate::error::SessionError;
use wand_state::StateStore;

/// Document slots, `Vec<String>`
pub const DOCUMENT: &str = "document";
/// Freeze flags, `Vec<bool>`
pub const FREEZE_MASK: &str = "freeze_mask";
/// Sketch list
pub const SKETCHES: &str = "sketches";
/// Generation cursor; absent means not started
pub const NEXT_STEP: &str = "next_step";
/// Parameters changed since the last full generation
pub const SHOULD_REGENERATE: &str = "should_regenerate";
/// Per-slot highlight strength, `Vec<f64>`
pub const HIGHLIGHT: &str = "highlight_coeff";
/// A full generation pass has completed at least once
pub const HAVE_GENERATED: &str = "have_generated_once";
/// Slot last replaced by the user
pub const LAST_MODIFIED: &str = "last_modified_index";
/// Opening message already shown
pub const DID_OPENING: &str = "did_opening";
/// Event raised when the user replaces a sentence
pub const JUST_FORCED: &str = "just_forced_sentence";

/// Per-unit "introduction shown" flag
#[must_use]
pub fn first_time_flag(description: &str) -> String {
    format!("flag_first_time_[{description}]")
}

/// Document padded or truncated to `slot_count`
pub(crate) fn document(state: &StateStore, slot_count: usize) -> Result<Vec<String>, SessionError> {
    let mut doc: Vec<String> = state.get_as(DOCUMENT)?.unwrap_or_default();
    doc.resize(slot_count, String::new());
    Ok(doc)
}

/// Freeze mask padded or truncated to `slot_count`
pub(crate) fn freeze_mask(state: &StateStore, slot_count: usize) -> Result<Vec<bool>, SessionError> {
    let mut mask: Vec<bool> = state.get_as(FREEZE_MASK)?.unwrap_or_default();
    mask.resize(slot_count, false);
    Ok(mask)
}

/// Highlight coefficients padded or truncated to `slot_count`
pub(crate) fn highlight(state: &StateStore, slot_count: usize) -> Result<Vec<f64>, SessionError> {
    let mut coeff: Vec<f64> = state.get_as(HIGHLIGHT)?.unwrap_or_default();
    coeff.resize(slot_count, 0.0);
    Ok(coeff)
}
