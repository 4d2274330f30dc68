//! Sketch list management
//!
//! Provides [`SketchBook`], the ordered list of sketches a session keeps.
//! Removal is exact-match and fails loudly so a presentation layer never
//! drifts out of sync with what generation actually uses.

use crate::weights::{generate_weights, TopicWeights};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sketch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SketchError {
    /// Weights were requested for a document with no slots
    #[error("slot count must be positive")]
    EmptyDocument,

    /// No sketch matched the requested triple
    #[error("sketch not found: {topic} [{start}..={end}]")]
    NotFound {
        topic: String,
        start: usize,
        end: usize,
    },

    /// Lookup with optional filters matched nothing
    #[error("no sketch matches the given filter")]
    NoMatch,

    /// `start` is after `end`
    #[error("invalid sketch range: start {start} is after end {end}")]
    InvalidRange { start: usize, end: usize },

    /// Range reaches past the last slot
    #[error("sketch range {start}..={end} exceeds slot count {slot_count}")]
    OutOfBounds {
        start: usize,
        end: usize,
        slot_count: usize,
    },

    /// Positional access past the end of the list
    #[error("sketch index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A topic applied over an inclusive slot interval
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sketch {
    /// Topic the generator should steer towards
    pub topic: String,
    /// First slot (inclusive)
    pub start: usize,
    /// Last slot (inclusive)
    pub end: usize,
}

impl Sketch {
    /// Create a new sketch
    #[inline]
    #[must_use]
    pub fn new(topic: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            topic: topic.into(),
            start,
            end,
        }
    }

    /// Check the sketch against a document of `slot_count` slots
    ///
    /// # Errors
    /// - `SketchError::InvalidRange` if `start > end`
    /// - `SketchError::OutOfBounds` if `end >= slot_count`
    pub fn validate(&self, slot_count: usize) -> Result<(), SketchError> {
        if self.start > self.end {
            return Err(SketchError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.end >= slot_count {
            return Err(SketchError::OutOfBounds {
                start: self.start,
                end: self.end,
                slot_count,
            });
        }
        Ok(())
    }

    /// Does this sketch share at least one slot with `start..=end`?
    #[inline]
    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        !(self.start > end || self.end < start)
    }

    #[inline]
    fn matches(&self, topic: &str, start: usize, end: usize) -> bool {
        self.topic == topic && self.start == start && self.end == end
    }
}

impl fmt::Display for Sketch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}..={}]", self.topic, self.start, self.end)
    }
}

/// Ordered list of sketches for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SketchBook {
    sketches: Vec<Sketch>,
}

impl SketchBook {
    /// Create an empty book
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a book from a previously saved list
    #[inline]
    #[must_use]
    pub fn from_sketches(sketches: Vec<Sketch>) -> Self {
        Self { sketches }
    }

    /// Append a sketch after validating it against `slot_count`
    ///
    /// # Errors
    /// Propagates [`Sketch::validate`] failures; the book is unchanged.
    pub fn append(&mut self, sketch: Sketch, slot_count: usize) -> Result<(), SketchError> {
        sketch.validate(slot_count)?;
        self.sketches.push(sketch);
        Ok(())
    }

    /// Remove the first sketch matching `(topic, start, end)` exactly
    ///
    /// # Errors
    /// `SketchError::NotFound` when no entry matches. This is never a no-op.
    pub fn remove(&mut self, topic: &str, start: usize, end: usize) -> Result<Sketch, SketchError> {
        let idx = self
            .sketches
            .iter()
            .position(|s| s.matches(topic, start, end))
            .ok_or_else(|| SketchError::NotFound {
                topic: topic.to_string(),
                start,
                end,
            })?;
        Ok(self.sketches.remove(idx))
    }

    /// Position of the first sketch matching every given filter
    ///
    /// A `None` filter matches anything.
    ///
    /// # Errors
    /// `SketchError::NoMatch` when nothing matches.
    pub fn position(
        &self,
        topic: Option<&str>,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<usize, SketchError> {
        self.sketches
            .iter()
            .position(|s| {
                topic.map_or(true, |t| s.topic == t)
                    && start.map_or(true, |v| s.start == v)
                    && end.map_or(true, |v| s.end == v)
            })
            .ok_or(SketchError::NoMatch)
    }

    /// Replace the sketch at `index`
    ///
    /// # Errors
    /// `SketchError::IndexOutOfRange` if there is no sketch at `index`.
    pub fn change_at(&mut self, index: usize, sketch: Sketch) -> Result<(), SketchError> {
        let len = self.sketches.len();
        let slot = self
            .sketches
            .get_mut(index)
            .ok_or(SketchError::IndexOutOfRange { index, len })?;
        *slot = sketch;
        Ok(())
    }

    /// Remove every sketch overlapping `start..=end`, returning them
    pub fn remove_overlapping(&mut self, start: usize, end: usize) -> Vec<Sketch> {
        let (removed, kept) = std::mem::take(&mut self.sketches)
            .into_iter()
            .partition(|s| s.overlaps(start, end));
        self.sketches = kept;
        removed
    }

    /// Drop all sketches
    #[inline]
    pub fn reset(&mut self) {
        self.sketches.clear();
    }

    /// Sketch at `index`
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Sketch> {
        self.sketches.get(index)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Sketch> {
        self.sketches.iter()
    }

    /// All sketches as a slice
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Sketch] {
        &self.sketches
    }

    /// Number of sketches
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sketches.len()
    }

    /// Whether the book holds no sketches
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sketches.is_empty()
    }

    /// Blend the book into per-topic weight curves
    ///
    /// # Errors
    /// `SketchError::EmptyDocument` if `slot_count == 0`.
    pub fn weights(&self, slot_count: usize, variance: f64) -> Result<TopicWeights, SketchError> {
        generate_weights(&self.sketches, slot_count, variance)
    }
}

impl<'a> IntoIterator for &'a SketchBook {
    type Item = &'a Sketch;
    type IntoIter = std::slice::Iter<'a, Sketch>;

    fn into_iter(self) -> Self::IntoIter {
        self.sketches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> SketchBook {
        let mut book = SketchBook::new();
        book.append(Sketch::new("Business", 0, 3), 10).unwrap();
        book.append(Sketch::new("Sports", 5, 9), 10).unwrap();
        book.append(Sketch::new("Business", 0, 3), 10).unwrap();
        book
    }

    #[test]
    fn append_validates_range() {
        let mut book = SketchBook::new();
        assert_eq!(
            book.append(Sketch::new("World", 4, 2), 10),
            Err(SketchError::InvalidRange { start: 4, end: 2 })
        );
        assert!(matches!(
            book.append(Sketch::new("World", 2, 10), 10),
            Err(SketchError::OutOfBounds { slot_count: 10, .. })
        ));
        assert!(book.is_empty());
    }

    #[test]
    fn single_slot_sketch_is_valid() {
        let mut book = SketchBook::new();
        book.append(Sketch::new("Science", 9, 9), 10).unwrap();
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn remove_takes_first_exact_match_only() {
        let mut book = book();
        let removed = book.remove("Business", 0, 3).unwrap();
        assert_eq!(removed, Sketch::new("Business", 0, 3));
        assert_eq!(book.len(), 2);

        book.remove("Business", 0, 3).unwrap();
        let err = book.remove("Business", 0, 3).unwrap_err();
        assert_eq!(
            err,
            SketchError::NotFound {
                topic: "Business".into(),
                start: 0,
                end: 3
            }
        );
    }

    #[test]
    fn remove_requires_all_three_fields() {
        let mut book = book();
        assert!(book.remove("Sports", 5, 8).is_err());
        assert!(book.remove("sports", 5, 9).is_err());
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn position_with_partial_filters() {
        let book = book();
        assert_eq!(book.position(Some("Sports"), None, None), Ok(1));
        assert_eq!(book.position(None, Some(0), Some(3)), Ok(0));
        assert_eq!(book.position(None, None, Some(7)), Err(SketchError::NoMatch));
    }

    #[test]
    fn change_at_replaces_in_place() {
        let mut book = book();
        book.change_at(1, Sketch::new("World", 6, 7)).unwrap();
        assert_eq!(book.get(1), Some(&Sketch::new("World", 6, 7)));
        assert_eq!(
            book.change_at(3, Sketch::new("World", 6, 7)),
            Err(SketchError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn remove_overlapping_keeps_disjoint() {
        let mut book = book();
        let removed = book.remove_overlapping(4, 5);
        assert_eq!(removed, vec![Sketch::new("Sports", 5, 9)]);
        assert_eq!(book.len(), 2);
        assert!(book.iter().all(|s| s.topic == "Business"));
    }

    #[test]
    fn serializes_as_plain_list() {
        let book = book();
        let json = serde_json::to_value(&book).unwrap();
        assert!(json.is_array());
        let back: SketchBook = serde_json::from_value(json).unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn display_shows_interval() {
        assert_eq!(Sketch::new("Sports", 2, 4).to_string(), "Sports [2..=4]");
    }
}
