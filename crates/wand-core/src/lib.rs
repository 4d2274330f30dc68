//! Wand Core - collaborative story session engine
//!
//! A person and the wand edit a fixed-length story, one turn at a time:
//! - [`CommunicationRegistry`] decides which units are offered and which
//!   one wants to interrupt
//! - [`Orchestrator`] runs the turn-budgeted loop with interrupt
//!   negotiation, refunds and a hash-chained turn log
//! - [`StoryContext`] is the typed view over session state (document,
//!   freeze mask, sketches, highlights) that units act through
//! - [`GenerationDriver`] regenerates the story slot by slot
//! - [`SessionManager`] runs many sessions concurrently over channels
//!
//! Presentation and the remote services stay behind the [`Transport`],
//! [`GenerationGateway`] and [`CriticGateway`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use wand_core::prelude::*;
//!
//! # async fn example(
//! #     generation: Arc<dyn GenerationGateway>,
//! #     critic: Arc<dyn CriticGateway>,
//! #     transport: Arc<dyn Transport>,
//! # ) -> Result<(), SessionError> {
//! let config = WandConfig::new().with_turn_budget(5);
//! let blueprint = SessionBlueprint::new(config, generation, critic)?;
//!
//! let mut orchestrator = blueprint.build(SessionId::random(), transport)?;
//! let summary = orchestrator.run().await;
//! println!("session ended: {:?}", summary.reason);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod blueprint;
pub mod budget;
pub mod config;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod logging;
pub mod menu;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod session_manager;
pub mod state_machine;
pub mod story;
pub mod transport;
pub mod types;
pub mod units;

pub use blueprint::SessionBlueprint;
pub use budget::TurnBudget;
pub use config::{GatewayConfig, SessionConfig, StoryConfig, UnitsConfig, WandConfig};
pub use driver::{GenerationDriver, StepOutcome};
pub use error::{ConfigError, GatewayError, LogError, SessionError};
pub use gateway::{
    BestMatches, CriticGateway, CriticRequest, CriticResponse, GenerationGateway,
    GenerationRequest, NoCritic, ReviewScores,
};
pub use logging::{
    verify_chain, FinalSave, JsonLinesSink, MemorySink, SessionSink, TurnDraft, TurnLog,
    TurnRecord,
};
pub use menu::{Menu, MenuEntry};
pub use orchestrator::Orchestrator;
pub use registry::CommunicationRegistry;
pub use session::Session;
pub use session_manager::{ChannelTransport, Outbound, ReplySlot, SessionManager};
pub use state_machine::{allowed_transitions, validate_transition, PhaseTracker, SessionPhase};
pub use story::{ContextQuery, ContextReply, StoryContext};
pub use transport::{Frontend, Transport, CANCEL_REPLY};
pub use types::{EndReason, ReplyOption, SessionId, SessionSummary, SessionView};
pub use units::{Communication, UnitKind, UnitTag};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the engine
    pub use crate::{
        Communication, CriticGateway, EndReason, GenerationGateway, Orchestrator, Session,
        SessionBlueprint, SessionError, SessionId, SessionManager, Transport, WandConfig,
    };
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
