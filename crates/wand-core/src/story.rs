//! Story context
//!
//! [`StoryContext`] is the typed view units use over the session's
//! [`StateStore`]. Document, freeze mask, sketches, generation cursor and
//! highlight coefficients all live in the store, so a checkpoint captures
//! everything needed to reconstruct the story after an undo.
//!
//! Besides the direct methods, every operation is reachable through the
//! closed [`ContextQuery`] type and [`StoryContext::execute`].

use crate::config::StoryConfig;
use crate::driver::{GenerationDriver, StepOutcome};
use crate::error::SessionError;
use crate::gateway::{
    best_matches, review_scores, BestMatches, CriticGateway, GenerationGateway, ReviewScores,
};
use crate::keys;
use crate::types::SessionView;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use wand_sketch::{Sketch, SketchBook, TopicMix, TopicWeights};
use wand_state::StateStore;

/// Request kinds accepted by [`StoryContext::execute`]
#[derive(Debug, Clone, PartialEq)]
pub enum ContextQuery {
    /// Append a sketch
    AddSketch(Sketch),
    /// Remove the first exact match
    RemoveSketch {
        /// Topic
        topic: String,
        /// First slot
        start: usize,
        /// Last slot
        end: usize,
    },
    /// Drop overlapping sketches and unfreeze the area
    ResetArea {
        /// First slot
        start: usize,
        /// Last slot
        end: usize,
    },
    /// Current weight curves
    TopicWeights,
    /// Freeze slots `0..=start`
    SetFreezeAfter {
        /// Freeze boundary; out of range clears the mask
        start: i64,
    },
    /// Advance the generation cursor
    GenerateStep,
    /// Generate text without touching the document
    GenerateOne {
        /// Prompt
        prompt: String,
        /// Topic mix
        topics: TopicMix,
    },
    /// Overwrite one slot
    ForceOne {
        /// Slot
        index: usize,
        /// New text
        text: String,
    },
    /// Document slots
    Document,
    /// Sketch list
    Sketches,
    /// Whether parameters changed since the last pass
    ShouldRegenerate,
    /// Flag the document for regeneration
    MarkRegenerate,
    /// Best matching line for each critic
    CriticBestMatch {
        /// Critic statements
        critics: Vec<String>,
    },
    /// Lines scoring above `threshold` for each review
    CriticScores {
        /// Reviews
        reviews: Vec<String>,
        /// Minimum score
        threshold: f64,
    },
    /// Whether every slot holds text
    DocumentFilled,
}

/// Answers from [`StoryContext::execute`]
#[derive(Debug, Clone, PartialEq)]
pub enum ContextReply {
    /// Operation had no return value
    Done,
    /// Sketch removed by exact match
    Removed(Sketch),
    /// Sketches removed or listed
    Sketches(Vec<Sketch>),
    /// Weight curves
    Weights(TopicWeights),
    /// Boolean answer
    Flag(bool),
    /// Generation step result
    Step(StepOutcome),
    /// Generated text
    Text(String),
    /// Document slots
    Document(Vec<String>),
    /// Critic best matches
    BestMatches(BestMatches),
    /// Critic scores
    Scores(ReviewScores),
}

/// Typed story state plus the services that act on it
pub struct StoryContext {
    state: StateStore,
    config: StoryConfig,
    driver: GenerationDriver,
    critic: Arc<dyn CriticGateway>,
    weight_cache: Option<(Vec<Sketch>, TopicWeights)>,
}

impl std::fmt::Debug for StoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryContext")
            .field("state", &self.state)
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl StoryContext {
    /// Empty story of `config.slot_count` slots
    #[must_use]
    pub fn new(
        config: StoryConfig,
        generation: Arc<dyn GenerationGateway>,
        critic: Arc<dyn CriticGateway>,
    ) -> Self {
        let slots = config.slot_count;
        let mut state = StateStore::new();
        state.set(keys::DOCUMENT, vec![String::new(); slots]);
        state.set(keys::FREEZE_MASK, vec![false; slots]);
        state.set(keys::SKETCHES, Value::Array(Vec::new()));
        state.set(keys::HIGHLIGHT, vec![0.0; slots]);

        Self {
            driver: GenerationDriver::new(generation, &config),
            state,
            config,
            critic,
            weight_cache: None,
        }
    }

    /// Underlying state store
    #[inline]
    #[must_use]
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Underlying state store, mutable
    #[inline]
    pub fn state_mut(&mut self) -> &mut StateStore {
        &mut self.state
    }

    /// Story parameters
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    /// Number of slots
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.config.slot_count
    }

    /// Check `index` against the slot count
    ///
    /// # Errors
    /// `SessionError::SlotOutOfRange`.
    pub fn check_slot(&self, index: usize) -> Result<(), SessionError> {
        if index < self.slot_count() {
            Ok(())
        } else {
            Err(SessionError::SlotOutOfRange {
                index,
                slot_count: self.slot_count(),
            })
        }
    }

    // --- sketches ---

    /// Current sketch list
    ///
    /// # Errors
    /// `SessionError::State` if the stored list is malformed.
    pub fn sketches(&self) -> Result<SketchBook, SessionError> {
        Ok(self.state.get_as(keys::SKETCHES)?.unwrap_or_default())
    }

    fn store_sketches(&mut self, book: &SketchBook) -> Result<(), SessionError> {
        self.state.set_as(keys::SKETCHES, book)?;
        self.mark_regenerate();
        Ok(())
    }

    /// Append a sketch after validating its bounds
    ///
    /// # Errors
    /// `SessionError::Sketch` for an invalid range.
    pub fn add_sketch(&mut self, sketch: Sketch) -> Result<(), SessionError> {
        let mut book = self.sketches()?;
        book.append(sketch, self.slot_count())?;
        self.store_sketches(&book)
    }

    /// Remove the first sketch matching exactly
    ///
    /// # Errors
    /// `SessionError::Sketch(NotFound)` if no sketch matches.
    pub fn remove_sketch(
        &mut self,
        topic: &str,
        start: usize,
        end: usize,
    ) -> Result<Sketch, SessionError> {
        let mut book = self.sketches()?;
        let removed = book.remove(topic, start, end)?;
        self.store_sketches(&book)?;
        Ok(removed)
    }

    /// Drop sketches overlapping `start..=end` and unfreeze those slots
    ///
    /// # Errors
    /// `SessionError::Sketch` for a reversed or out-of-bounds range.
    pub fn reset_area(&mut self, start: usize, end: usize) -> Result<Vec<Sketch>, SessionError> {
        Sketch::new("", start, end).validate(self.slot_count())?;
        let mut book = self.sketches()?;
        let removed = book.remove_overlapping(start, end);

        let mut mask = keys::freeze_mask(&self.state, self.slot_count())?;
        mask[start..=end].iter_mut().for_each(|m| *m = false);
        self.state.set_as(keys::FREEZE_MASK, &mask)?;

        self.store_sketches(&book)?;
        debug!(start, end, removed = removed.len(), "area reset");
        Ok(removed)
    }

    /// Weight curves for the current sketches, cached until they change
    ///
    /// # Errors
    /// `SessionError::State` if the stored sketches are malformed.
    pub fn topic_weights(&mut self) -> Result<TopicWeights, SessionError> {
        let book = self.sketches()?;
        if let Some((cached, weights)) = &self.weight_cache {
            if cached.as_slice() == book.as_slice() {
                return Ok(weights.clone());
            }
        }
        let weights = book.weights(self.slot_count(), self.config.variance)?;
        self.weight_cache = Some((book.as_slice().to_vec(), weights.clone()));
        Ok(weights)
    }

    /// At least one topic carries weight
    ///
    /// # Errors
    /// `SessionError::State` if the stored sketches are malformed.
    pub fn is_generation_ready(&mut self) -> Result<bool, SessionError> {
        Ok(!self.topic_weights()?.is_empty())
    }

    // --- freeze mask ---

    /// Current freeze mask
    ///
    /// # Errors
    /// `SessionError::State` if the stored mask is malformed.
    pub fn freeze_mask(&self) -> Result<Vec<bool>, SessionError> {
        keys::freeze_mask(&self.state, self.slot_count())
    }

    /// Freeze slots `0..=start`, unfreeze the rest
    ///
    /// `start` outside `0..=slot_count-2` clears the whole mask and
    /// returns `false`.
    ///
    /// # Errors
    /// `SessionError::State` on encode failure.
    pub fn set_freeze_mask(&mut self, start: i64) -> Result<bool, SessionError> {
        let slots = self.slot_count();
        let boundary = usize::try_from(start)
            .ok()
            .filter(|s| slots >= 2 && *s <= slots - 2);

        let mask: Vec<bool> = match boundary {
            Some(b) => (0..slots).map(|i| i <= b).collect(),
            None => vec![false; slots],
        };
        self.state.set_as(keys::FREEZE_MASK, &mask)?;
        self.mark_regenerate();
        Ok(boundary.is_some())
    }

    // --- document ---

    /// Current document
    ///
    /// # Errors
    /// `SessionError::State` if the stored document is malformed.
    pub fn document(&self) -> Result<Vec<String>, SessionError> {
        keys::document(&self.state, self.slot_count())
    }

    /// Every slot holds text
    ///
    /// # Errors
    /// `SessionError::State` if the stored document is malformed.
    pub fn document_filled(&self) -> Result<bool, SessionError> {
        Ok(self.document()?.iter().all(|s| !s.trim().is_empty()))
    }

    /// Advance generation by one slot
    ///
    /// Finishing a pass records that the story has been generated and
    /// clears the regeneration flag.
    ///
    /// # Errors
    /// Gateway and state errors; the cursor is left in place.
    pub async fn generate_step(&mut self) -> Result<StepOutcome, SessionError> {
        let weights = self.topic_weights()?;
        let outcome = self.driver.step(&mut self.state, &weights).await?;
        if outcome.done {
            self.state.set(keys::HAVE_GENERATED, true);
            self.state.set(keys::SHOULD_REGENERATE, false);
        }
        Ok(outcome)
    }

    /// Run generation steps until the pass completes
    ///
    /// Returns how many slots received new text.
    ///
    /// # Errors
    /// First step failure.
    pub async fn generate_all(&mut self) -> Result<usize, SessionError> {
        let mut written = 0;
        loop {
            let outcome = self.generate_step().await?;
            if outcome.done {
                return Ok(written);
            }
            if outcome.slot_value.is_some() {
                written += 1;
            }
        }
    }

    /// Generate text without touching the document
    ///
    /// # Errors
    /// Gateway failures.
    pub async fn generate_one(
        &self,
        prompt: impl Into<String>,
        topics: TopicMix,
    ) -> Result<String, SessionError> {
        Ok(self.driver.generate_one(prompt, topics).await?)
    }

    /// Generation prompt for slot `index` given the current document
    ///
    /// # Errors
    /// `SessionError::State` if the stored document is malformed.
    pub fn prompt_for(&self, index: usize) -> Result<String, SessionError> {
        Ok(self.driver.prompt_for(&self.document()?, index))
    }

    /// Overwrite slot `index`, ignoring cursor and freeze mask
    ///
    /// # Errors
    /// `SlotOutOfRange` if `index` is past the document.
    pub fn force_one(&mut self, index: usize, text: impl Into<String>) -> Result<(), SessionError> {
        self.check_slot(index)?;
        let mut document = self.document()?;
        document[index] = text.into();
        self.state.set_as(keys::DOCUMENT, &document)?;
        Ok(())
    }

    /// Parameters changed since the last full pass
    #[inline]
    #[must_use]
    pub fn should_regenerate(&self) -> bool {
        self.state.flag(keys::SHOULD_REGENERATE)
    }

    /// Flag the document for regeneration
    #[inline]
    pub fn mark_regenerate(&mut self) {
        self.state.set(keys::SHOULD_REGENERATE, true);
    }

    /// A full pass has completed at least once
    #[inline]
    #[must_use]
    pub fn has_generated(&self) -> bool {
        self.state.flag(keys::HAVE_GENERATED)
    }

    // --- highlight ---

    /// Per-slot highlight strength
    ///
    /// # Errors
    /// `SessionError::State` if the stored values are malformed.
    pub fn highlight(&self) -> Result<Vec<f64>, SessionError> {
        keys::highlight(&self.state, self.slot_count())
    }

    /// Replace highlight values
    ///
    /// # Errors
    /// `SessionError::State` on encode failure.
    pub fn set_highlight(&mut self, mut coeff: Vec<f64>) -> Result<(), SessionError> {
        coeff.resize(self.slot_count(), 0.0);
        self.state.set_as(keys::HIGHLIGHT, &coeff)?;
        Ok(())
    }

    // --- critic ---

    fn story_lines(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .document()?
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect())
    }

    /// Best matching document line for each critic
    ///
    /// # Errors
    /// Gateway failures.
    pub async fn critic_best_match(
        &self,
        critics: Vec<String>,
    ) -> Result<BestMatches, SessionError> {
        let stories = self.story_lines()?;
        Ok(best_matches(self.critic.as_ref(), stories, critics).await?)
    }

    /// Document lines scoring above `threshold` for each review
    ///
    /// # Errors
    /// Gateway failures.
    pub async fn critic_scores(
        &self,
        reviews: Vec<String>,
        threshold: f64,
    ) -> Result<ReviewScores, SessionError> {
        let stories = self.story_lines()?;
        self.score_lines(stories, reviews, threshold).await
    }

    /// Score arbitrary lines, not only the document
    ///
    /// # Errors
    /// Gateway failures.
    pub async fn score_lines(
        &self,
        stories: Vec<String>,
        reviews: Vec<String>,
        threshold: f64,
    ) -> Result<ReviewScores, SessionError> {
        let reviews: BTreeMap<String, f64> =
            reviews.into_iter().map(|r| (r, threshold)).collect();
        Ok(review_scores(self.critic.as_ref(), stories, reviews).await?)
    }

    // --- checkpoint / undo ---

    /// Snapshot the state
    #[inline]
    pub fn checkpoint(&mut self) {
        self.state.checkpoint();
    }

    /// Whether an undo would change anything
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.state.can_undo()
    }

    /// Restore the last checkpoint
    #[inline]
    pub fn undo(&mut self) -> bool {
        self.state.restore_last_checkpoint()
    }

    /// Display snapshot
    ///
    /// # Errors
    /// `SessionError::State` if stored values are malformed.
    pub fn view(&self, turns_left: i64) -> Result<SessionView, SessionError> {
        Ok(SessionView {
            document: self.document()?,
            sketches: self.sketches()?.as_slice().to_vec(),
            highlight: self.highlight()?,
            freeze_mask: self.freeze_mask()?,
            turns_left,
        })
    }

    /// Dispatch a [`ContextQuery`]
    ///
    /// # Errors
    /// Whatever the matching operation returns.
    pub async fn execute(&mut self, query: ContextQuery) -> Result<ContextReply, SessionError> {
        let reply = match query {
            ContextQuery::AddSketch(sketch) => {
                self.add_sketch(sketch)?;
                ContextReply::Done
            }
            ContextQuery::RemoveSketch { topic, start, end } => {
                ContextReply::Removed(self.remove_sketch(&topic, start, end)?)
            }
            ContextQuery::ResetArea { start, end } => {
                ContextReply::Sketches(self.reset_area(start, end)?)
            }
            ContextQuery::TopicWeights => ContextReply::Weights(self.topic_weights()?),
            ContextQuery::SetFreezeAfter { start } => {
                ContextReply::Flag(self.set_freeze_mask(start)?)
            }
            ContextQuery::GenerateStep => ContextReply::Step(self.generate_step().await?),
            ContextQuery::GenerateOne { prompt, topics } => {
                ContextReply::Text(self.generate_one(prompt, topics).await?)
            }
            ContextQuery::ForceOne { index, text } => {
                self.force_one(index, text)?;
                ContextReply::Done
            }
            ContextQuery::Document => ContextReply::Document(self.document()?),
            ContextQuery::Sketches => {
                ContextReply::Sketches(self.sketches()?.as_slice().to_vec())
            }
            ContextQuery::ShouldRegenerate => ContextReply::Flag(self.should_regenerate()),
            ContextQuery::MarkRegenerate => {
                self.mark_regenerate();
                ContextReply::Done
            }
            ContextQuery::CriticBestMatch { critics } => {
                ContextReply::BestMatches(self.critic_best_match(critics).await?)
            }
            ContextQuery::CriticScores { reviews, threshold } => {
                ContextReply::Scores(self.critic_scores(reviews, threshold).await?)
            }
            ContextQuery::DocumentFilled => ContextReply::Flag(self.document_filled()?),
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::{CriticRequest, CriticResponse, GenerationRequest, NoCritic};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use wand_sketch::SketchError;

    struct Numbered(parking_lot::Mutex<usize>);

    #[async_trait]
    impl GenerationGateway for Numbered {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, GatewayError> {
            let mut n = self.0.lock();
            *n += 1;
            Ok(format!("s{n}."))
        }
    }

    struct EchoCritic;

    #[async_trait]
    impl CriticGateway for EchoCritic {
        async fn critique(&self, request: &CriticRequest) -> Result<CriticResponse, GatewayError> {
            match request {
                CriticRequest::BestMatch { stories, reviews } => Ok(CriticResponse::BestMatch(
                    reviews
                        .iter()
                        .map(|r| (r.clone(), stories.first().cloned().unwrap_or_default()))
                        .collect(),
                )),
                CriticRequest::Scores { .. } => Err(GatewayError::Unavailable("scores".into())),
            }
        }
    }

    fn story(slots: usize) -> StoryContext {
        let config = StoryConfig {
            slot_count: slots,
            ..StoryConfig::default()
        };
        StoryContext::new(
            config,
            Arc::new(Numbered(parking_lot::Mutex::new(0))),
            Arc::new(NoCritic),
        )
    }

    #[test]
    fn freeze_boundary_scenario() {
        let mut ctx = story(5);
        assert!(ctx.set_freeze_mask(2).unwrap());
        assert_eq!(ctx.freeze_mask().unwrap(), vec![true, true, true, false, false]);
        assert!(ctx.should_regenerate());
    }

    #[test]
    fn frozen_slots_feed_the_prompt() {
        let mut ctx = story(5);
        ctx.force_one(0, "Kept.").unwrap();
        ctx.force_one(1, "Also kept.").unwrap();
        assert!(ctx.set_freeze_mask(1).unwrap());
        assert!(ctx.prompt_for(2).unwrap().ends_with("Kept. Also kept."));
        assert!(ctx.prompt_for(3).unwrap().ends_with(" Also kept."));
    }

    #[test]
    fn freeze_boundary_out_of_range_clears() {
        let mut ctx = story(5);
        ctx.set_freeze_mask(1).unwrap();
        for start in [-1, 4, 5, 100] {
            assert!(!ctx.set_freeze_mask(start).unwrap());
            assert_eq!(ctx.freeze_mask().unwrap(), vec![false; 5]);
        }
    }

    #[test]
    fn sketches_validate_and_invalidate_cache() {
        let mut ctx = story(5);
        assert!(!ctx.is_generation_ready().unwrap());
        ctx.add_sketch(Sketch::new("Sports", 0, 4)).unwrap();
        let first = ctx.topic_weights().unwrap();
        assert!(first.contains_key("Sports"));

        ctx.add_sketch(Sketch::new("World", 1, 2)).unwrap();
        assert!(ctx.topic_weights().unwrap().contains_key("World"));

        assert!(matches!(
            ctx.add_sketch(Sketch::new("World", 3, 5)),
            Err(SessionError::Sketch(SketchError::OutOfBounds { .. }))
        ));
        assert!(matches!(
            ctx.remove_sketch("Science", 0, 1),
            Err(SessionError::Sketch(SketchError::NotFound { .. }))
        ));
    }

    #[test]
    fn reset_area_unfreezes_and_drops_overlaps() {
        let mut ctx = story(6);
        ctx.add_sketch(Sketch::new("Sports", 0, 1)).unwrap();
        ctx.add_sketch(Sketch::new("World", 4, 5)).unwrap();
        ctx.set_freeze_mask(4).unwrap();

        let removed = ctx.reset_area(0, 2).unwrap();
        assert_eq!(removed, vec![Sketch::new("Sports", 0, 1)]);
        assert_eq!(
            ctx.freeze_mask().unwrap(),
            vec![false, false, false, true, true, false]
        );
        assert_eq!(ctx.sketches().unwrap().len(), 1);
        assert!(ctx.reset_area(0, 6).is_err());
    }

    #[tokio::test]
    async fn full_pass_sets_flags() {
        let mut ctx = story(3);
        ctx.mark_regenerate();
        assert_eq!(ctx.generate_all().await.unwrap(), 3);
        assert!(ctx.has_generated());
        assert!(!ctx.should_regenerate());
        assert!(ctx.document_filled().unwrap());
        assert_eq!(ctx.document().unwrap(), vec!["s1.", "s2.", "s3."]);
    }

    #[tokio::test]
    async fn undo_restores_document_and_cursor() {
        let mut ctx = story(3);
        ctx.checkpoint();
        ctx.generate_step().await.unwrap();
        ctx.force_one(2, "mine.").unwrap();
        assert!(ctx.can_undo());
        assert!(ctx.undo());
        assert_eq!(ctx.document().unwrap(), vec![""; 3]);
        assert!(!ctx.state().contains(keys::NEXT_STEP));
    }

    #[tokio::test]
    async fn execute_dispatches_queries() {
        let config = StoryConfig {
            slot_count: 3,
            ..StoryConfig::default()
        };
        let mut ctx = StoryContext::new(
            config,
            Arc::new(Numbered(parking_lot::Mutex::new(0))),
            Arc::new(EchoCritic),
        );

        ctx.execute(ContextQuery::ForceOne {
            index: 0,
            text: "A dog.".into(),
        })
        .await
        .unwrap();
        assert_eq!(
            ctx.execute(ContextQuery::DocumentFilled).await.unwrap(),
            ContextReply::Flag(false)
        );
        let reply = ctx
            .execute(ContextQuery::CriticBestMatch {
                critics: vec!["dogs".into()],
            })
            .await
            .unwrap();
        let ContextReply::BestMatches(matches) = reply else {
            panic!("unexpected reply {reply:?}");
        };
        assert_eq!(matches["dogs"], "A dog.");

        assert!(matches!(
            ctx.execute(ContextQuery::ForceOne {
                index: 3,
                text: String::new()
            })
            .await,
            Err(SessionError::SlotOutOfRange { index: 3, .. })
        ));
        assert!(matches!(
            ctx.execute(ContextQuery::CriticScores {
                reviews: vec![],
                threshold: 0.1
            })
            .await,
            Err(SessionError::Gateway(GatewayError::Unavailable(_)))
        ));
    }

    #[test]
    fn view_reflects_state() {
        let mut ctx = story(3);
        ctx.set_highlight(vec![0.5]).unwrap();
        let view = ctx.view(7).unwrap();
        assert_eq!(view.highlight, vec![0.5, 0.0, 0.0]);
        assert_eq!(view.turns_left, 7);
        assert_eq!(view.document.len(), 3);
    }
}
