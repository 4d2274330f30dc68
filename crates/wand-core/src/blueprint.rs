//! Session construction
//!
//! A [`SessionBlueprint`] holds everything shared between sessions:
//! configuration, gateways, the sink, and optionally a fixed unit list.
//! Each [`SessionBlueprint::build`] call produces an independent
//! orchestrator with fresh story state.

use crate::config::WandConfig;
use crate::error::SessionError;
use crate::gateway::{CriticGateway, GenerationGateway};
use crate::logging::{JsonLinesSink, MemorySink, SessionSink};
use crate::orchestrator::Orchestrator;
use crate::registry::CommunicationRegistry;
use crate::session::Session;
use crate::story::StoryContext;
use crate::transport::{Frontend, Transport};
use crate::types::SessionId;
use std::sync::Arc;

/// Shared ingredients for building sessions
#[derive(Clone)]
pub struct SessionBlueprint {
    config: WandConfig,
    generation: Arc<dyn GenerationGateway>,
    critic: Arc<dyn CriticGateway>,
    sink: Arc<dyn SessionSink>,
    registry: Option<CommunicationRegistry>,
    seed: Option<u64>,
}

impl std::fmt::Debug for SessionBlueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBlueprint")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl SessionBlueprint {
    /// Validate `config` and pick a sink: JSON lines under `log_dir`,
    /// memory otherwise
    ///
    /// # Errors
    /// `SessionError::Config` for invalid values, `SessionError::Log` if
    /// the log directory cannot be created.
    pub fn new(
        config: WandConfig,
        generation: Arc<dyn GenerationGateway>,
        critic: Arc<dyn CriticGateway>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let sink: Arc<dyn SessionSink> = match &config.log_dir {
            Some(dir) => Arc::new(JsonLinesSink::new(dir)?),
            None => Arc::new(MemorySink::new()),
        };
        Ok(Self {
            config,
            generation,
            critic,
            sink,
            registry: None,
            seed: None,
        })
    }

    /// Replace the sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use a fixed unit list instead of the configured preset
    #[must_use]
    pub fn with_registry(mut self, registry: CommunicationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Seed every built session's random choices
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Configuration sessions are built from
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WandConfig {
        &self.config
    }

    /// Sink receiving turn records and final saves
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn SessionSink> {
        &self.sink
    }

    /// Fresh orchestrator for `id` talking over `transport`
    ///
    /// # Errors
    /// `SessionError::Config` for an unknown unit preset.
    pub fn build(
        &self,
        id: SessionId,
        transport: Arc<dyn Transport>,
    ) -> Result<Orchestrator, SessionError> {
        let registry = match &self.registry {
            Some(registry) => registry.clone(),
            None => CommunicationRegistry::from_config(&self.config.units)?,
        };
        let story = StoryContext::new(
            self.config.story.clone(),
            Arc::clone(&self.generation),
            Arc::clone(&self.critic),
        );
        let mut session = Session::new(
            id,
            story,
            Frontend::new(transport),
            self.config.session.clone(),
        );
        if let Some(seed) = self.seed {
            session = session.with_seed(seed);
        }
        Ok(Orchestrator::new(session, registry, Arc::clone(&self.sink)))
    }
}
