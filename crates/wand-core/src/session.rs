//! Per-session handle passed to interaction units

use crate::config::SessionConfig;
use crate::story::StoryContext;
use crate::transport::Frontend;
use crate::types::SessionId;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Everything a unit may touch during one session
///
/// Owned exclusively by one orchestrator; units borrow it mutably for the
/// duration of `activate`, so no locking is needed.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    story: StoryContext,
    frontend: Frontend,
    config: SessionConfig,
    rng: StdRng,
}

impl Session {
    /// Create new session with an entropy-seeded generator
    #[must_use]
    pub fn new(
        id: SessionId,
        story: StoryContext,
        frontend: Frontend,
        config: SessionConfig,
    ) -> Self {
        Self {
            id,
            story,
            frontend,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Reseed random choices made by units
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Story state
    #[inline]
    #[must_use]
    pub fn story(&self) -> &StoryContext {
        &self.story
    }

    /// Story state, mutable
    #[inline]
    pub fn story_mut(&mut self) -> &mut StoryContext {
        &mut self.story
    }

    /// Transport handle; cheap to clone
    #[inline]
    #[must_use]
    pub fn frontend(&self) -> &Frontend {
        &self.frontend
    }

    /// Loop settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Random source for units
    #[inline]
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
