//! Step-by-step document generation
//!
//! The cursor lives in session state under [`keys::NEXT_STEP`], so a pass
//! interrupted by a failure or a cancelled unit resumes where it stopped
//! and is captured by checkpoints like everything else.

use crate::config::StoryConfig;
use crate::error::{GatewayError, SessionError};
use crate::gateway::{GenerationGateway, GenerationRequest};
use crate::keys;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use wand_sketch::{weights_at, TopicMix, TopicWeights};
use wand_state::StateStore;

/// Result of one [`GenerationDriver::step`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Pass finished; the cursor has been cleared
    pub done: bool,
    /// Slot this step worked on, or `slot_count` when done
    pub index: usize,
    /// New text, `None` when the slot was kept or the pass is done
    pub slot_value: Option<String>,
}

/// Generates slots one at a time through a [`GenerationGateway`]
#[derive(Clone)]
pub struct GenerationDriver {
    gateway: Arc<dyn GenerationGateway>,
    slot_count: usize,
    initial_prompt: String,
    bad_tokens: Vec<String>,
    max_horizon: usize,
    max_attempts: usize,
}

impl std::fmt::Debug for GenerationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationDriver")
            .field("slot_count", &self.slot_count)
            .field("max_horizon", &self.max_horizon)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl GenerationDriver {
    /// Create new driver
    #[must_use]
    pub fn new(gateway: Arc<dyn GenerationGateway>, config: &StoryConfig) -> Self {
        Self {
            gateway,
            slot_count: config.slot_count,
            initial_prompt: config.initial_prompt.clone(),
            bad_tokens: config.bad_tokens.clone(),
            max_horizon: config.max_horizon,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Number of slots this driver fills
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Prompt for slot `index`: the initial prompt plus the text of the
    /// `max_horizon` slots right before `index`, in story order
    ///
    /// The window is positional. Frozen slots are part of it, and empty
    /// slots inside it add nothing, so the context can hold fewer than
    /// `max_horizon` lines.
    #[must_use]
    pub fn prompt_for(&self, document: &[String], index: usize) -> String {
        let from = index.saturating_sub(self.max_horizon);
        let context: Vec<&str> = document
            .get(from..index.min(document.len()))
            .unwrap_or_default()
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        if context.is_empty() {
            self.initial_prompt.clone()
        } else {
            format!("{} {}", self.initial_prompt.trim_end(), context.join(" "))
        }
    }

    /// Whether `text` contains a disallowed token
    #[must_use]
    pub fn is_bad(&self, text: &str) -> bool {
        self.bad_tokens.iter().any(|t| text.contains(t.as_str()))
    }

    /// Generate text for slot `index` without touching state
    ///
    /// Retries while the output contains a disallowed token. After the
    /// last attempt the output is kept as is and a warning is logged.
    ///
    /// # Errors
    /// Gateway failures propagate immediately.
    pub async fn generate_slot(
        &self,
        document: &[String],
        index: usize,
        weights: &TopicWeights,
    ) -> Result<String, GatewayError> {
        let request = GenerationRequest::new(
            self.prompt_for(document, index),
            weights_at(weights, index, self.slot_count),
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let text = self.gateway.generate(&request).await?;
            if !self.is_bad(&text) {
                return Ok(text);
            }
            if attempt >= self.max_attempts {
                warn!(
                    index,
                    attempts = attempt,
                    "generation kept despite disallowed tokens"
                );
                return Ok(text);
            }
            debug!(index, attempt, "disallowed tokens in generation, retrying");
        }
    }

    /// Advance the generation cursor by one slot
    ///
    /// - cursor absent: generate slot 0, cursor becomes 1
    /// - cursor == `slot_count`: clear it and report done
    /// - otherwise: generate the slot under the cursor and advance
    ///
    /// A frozen slot that already holds text is kept and reported with
    /// `slot_value: None`. The cursor only advances after success.
    ///
    /// # Errors
    /// Gateway and state errors; the cursor is left unchanged.
    pub async fn step(
        &self,
        state: &mut StateStore,
        weights: &TopicWeights,
    ) -> Result<StepOutcome, SessionError> {
        let index = match state.get_as::<usize>(keys::NEXT_STEP)? {
            None => 0,
            Some(next) if next >= self.slot_count => {
                state.remove(keys::NEXT_STEP);
                return Ok(StepOutcome {
                    done: true,
                    index: next,
                    slot_value: None,
                });
            }
            Some(next) => next,
        };

        let mut document = keys::document(state, self.slot_count)?;
        let mask = keys::freeze_mask(state, self.slot_count)?;

        let slot_value = if mask[index] && !document[index].is_empty() {
            None
        } else {
            let text = self.generate_slot(&document, index, weights).await?;
            document[index].clone_from(&text);
            state.set_as(keys::DOCUMENT, &document)?;
            Some(text)
        };

        state.set_as(keys::NEXT_STEP, &(index + 1))?;
        Ok(StepOutcome {
            done: false,
            index,
            slot_value,
        })
    }

    /// One-off generation that does not touch the document
    ///
    /// # Errors
    /// Gateway failures.
    pub async fn generate_one(
        &self,
        prompt: impl Into<String>,
        topics: TopicMix,
    ) -> Result<String, GatewayError> {
        self.gateway
            .generate(&GenerationRequest::new(prompt, topics))
            .await
    }
}
