//! Testing utilities for the Creative Wand workspace
//!
//! Scripted transport, fake gateways and small probe units shared by
//! integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wand_core::gateway::{CriticRequest, CriticResponse, GenerationRequest};
use wand_core::{
    Communication, CommunicationRegistry, CriticGateway, GatewayError, GenerationGateway,
    MemorySink, Orchestrator, ReplyOption, Session, SessionBlueprint, SessionError, SessionId,
    SessionView, StoryContext, Transport, WandConfig,
};

/// Transport answering prompts from a fixed script
///
/// Ends the session once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
    views: Mutex<Vec<SessionView>>,
}

impl ScriptedTransport {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().clone()
    }

    pub fn views(&self) -> Vec<SessionView> {
        self.views.lock().clone()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.lock().len()
    }

    pub fn saw_notice(&self, needle: &str) -> bool {
        self.notices.lock().iter().any(|n| n.contains(needle))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request_reply(
        &self,
        message: &str,
        _options: &[ReplyOption],
    ) -> Result<String, SessionError> {
        self.prompts.lock().push(message.to_string());
        self.replies
            .lock()
            .pop_front()
            .ok_or(SessionError::SessionEnded)
    }

    async fn send_notice(
        &self,
        message: &str,
        _options: &[ReplyOption],
    ) -> Result<(), SessionError> {
        self.notices.lock().push(message.to_string());
        Ok(())
    }

    async fn publish_view(&self, view: &SessionView) -> Result<(), SessionError> {
        self.views.lock().push(view.clone());
        Ok(())
    }
}

/// Generation gateway returning queued sentences, then `"Sentence <n>."`
#[derive(Debug, Default)]
pub struct FakeGeneration {
    queued: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

impl FakeGeneration {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_outputs<I, S>(outputs: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            queued: Mutex::new(outputs.into_iter().map(Into::into).collect()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerationGateway for FakeGeneration {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        Ok(self
            .queued
            .lock()
            .pop_front()
            .unwrap_or_else(|| format!("Sentence {n}.")))
    }
}

/// Critic scoring lines from a fixed table; unknown lines score 0
#[derive(Debug, Default)]
pub struct FakeCritic {
    scores: Mutex<BTreeMap<String, f64>>,
    requests: Mutex<Vec<CriticRequest>>,
}

impl FakeCritic {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_scores<I, S>(scores: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Arc::new(Self {
            scores: Mutex::new(scores.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<CriticRequest> {
        self.requests.lock().clone()
    }

    fn score(&self, line: &str) -> f64 {
        self.scores.lock().get(line).copied().unwrap_or(0.0)
    }
}

#[async_trait]
impl CriticGateway for FakeCritic {
    async fn critique(&self, request: &CriticRequest) -> Result<CriticResponse, GatewayError> {
        self.requests.lock().push(request.clone());
        match request {
            CriticRequest::BestMatch { stories, reviews } => {
                let best = stories
                    .iter()
                    .max_by(|a, b| self.score(a).total_cmp(&self.score(b)))
                    .cloned()
                    .unwrap_or_default();
                Ok(CriticResponse::BestMatch(
                    reviews.iter().map(|r| (r.clone(), best.clone())).collect(),
                ))
            }
            CriticRequest::Scores { stories, reviews } => Ok(CriticResponse::Scores(
                reviews
                    .iter()
                    .map(|(review, threshold)| {
                        let lines = stories
                            .iter()
                            .map(|s| (s.clone(), self.score(s)))
                            .filter(|(_, score)| score > threshold)
                            .collect();
                        (review.clone(), lines)
                    })
                    .collect(),
            )),
        }
    }
}

/// What a [`ProbeUnit`] does when activated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBehavior {
    /// Return `Ok(true)`
    Act,
    /// Return `Ok(false)`
    Idle,
    /// Return `Err(Cancelled)`
    Cancel,
    /// Return a non-terminal failure
    Fail,
    /// Ask one question, then act
    AskThenAct,
}

/// Configurable unit that counts its activations
#[derive(Debug)]
pub struct ProbeUnit {
    description: String,
    behavior: ProbeBehavior,
    interrupt: bool,
    available: bool,
    activations: AtomicUsize,
}

impl ProbeUnit {
    pub fn new(description: &str, behavior: ProbeBehavior) -> Arc<Self> {
        Arc::new(Self {
            description: description.to_string(),
            behavior,
            interrupt: false,
            available: true,
            activations: AtomicUsize::new(0),
        })
    }

    /// Always wants to interrupt, never listed in the menu
    pub fn interrupting(description: &str, behavior: ProbeBehavior) -> Arc<Self> {
        Arc::new(Self {
            description: description.to_string(),
            behavior,
            interrupt: true,
            available: false,
            activations: AtomicUsize::new(0),
        })
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Communication for ProbeUnit {
    fn description(&self) -> &str {
        &self.description
    }

    fn can_activate(&self, _session: &Session) -> bool {
        self.available
    }

    fn confidence_to_interrupt(&self, _session: &Session) -> f64 {
        if self.interrupt {
            1.0
        } else {
            0.0
        }
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ProbeBehavior::Act => Ok(true),
            ProbeBehavior::Idle => Ok(false),
            ProbeBehavior::Cancel => Err(SessionError::Cancelled),
            ProbeBehavior::Fail => Err(GatewayError::Request("probe failure".into()).into()),
            ProbeBehavior::AskThenAct => {
                session.frontend().ask("Probe question?").await?;
                Ok(true)
            }
        }
    }
}

/// Config for fast tests: small story, no turn announcements
pub fn test_config(turn_budget: i64) -> WandConfig {
    let mut config = WandConfig::new()
        .with_turn_budget(turn_budget)
        .with_slot_count(5);
    config.session.announce_turns = false;
    config
}

/// Blueprint over fake gateways and a memory sink
pub fn test_blueprint(
    config: WandConfig,
    sink: Arc<MemorySink>,
) -> Result<SessionBlueprint, SessionError> {
    Ok(SessionBlueprint::new(config, FakeGeneration::new(), FakeCritic::new())?
        .with_sink(sink)
        .with_seed(7))
}

/// Orchestrator over `units` driven by `transport`
pub fn orchestrator_with_units(
    config: WandConfig,
    units: Vec<Arc<dyn Communication>>,
    transport: Arc<ScriptedTransport>,
    sink: Arc<MemorySink>,
) -> Result<Orchestrator, SessionError> {
    test_blueprint(config, sink)?
        .with_registry(CommunicationRegistry::new(units))
        .build(SessionId::new("test-session"), transport)
}

/// Bare session for exercising units directly
pub fn test_session(
    config: &WandConfig,
    generation: Arc<FakeGeneration>,
    critic: Arc<FakeCritic>,
    transport: Arc<ScriptedTransport>,
) -> Session {
    let story = StoryContext::new(config.story.clone(), generation, critic);
    Session::new(
        SessionId::new("unit-session"),
        story,
        wand_core::Frontend::new(transport),
        config.session.clone(),
    )
    .with_seed(7)
}
