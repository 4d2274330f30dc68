//! Session orchestrator
//!
//! Runs the turn loop for one session:
//! 1. checkpoint the state and publish the view
//! 2. stop when the budget is used up
//! 3. offer the first interrupt-preferred unit, free of charge
//! 4. otherwise charge a turn and present the paged menu
//! 5. run the selected unit, refunding the turn if it did nothing
//!
//! Unit failures never end the loop. Cancellation, unresolved selections
//! and every other non-terminal error refund the turn and re-prompt; only
//! a closed transport or a reply timeout stops the session. The final
//! state is always handed to the sink.

use crate::budget::TurnBudget;
use crate::error::SessionError;
use crate::logging::{SessionSink, TurnDraft, TurnLog};
use crate::menu::{Menu, DONE_KEY, NEXT_PAGE, PREVIOUS_PAGE};
use crate::registry::CommunicationRegistry;
use crate::session::Session;
use crate::state_machine::{PhaseTracker, SessionPhase};
use crate::transport::{is_yes, yn_options};
use crate::types::{EndReason, SessionSummary};
use crate::units::Communication;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shortest description the critic fallback will consider
const MIN_CRITIC_DESCRIPTION: usize = 5;
/// Score a free-text reply must reach to match a description
const CRITIC_OPTION_THRESHOLD: f64 = 0.1;

enum TurnOutcome {
    Continue,
    Finished(EndReason),
}

enum Selection {
    Unit(String, Arc<dyn Communication>),
    /// Ends the session. The turn charged for the menu is refunded, so
    /// the closing notice and the summary count only executed turns.
    Done,
    Unresolved(String),
}

/// Turn loop for one session
pub struct Orchestrator {
    session: Session,
    registry: CommunicationRegistry,
    budget: TurnBudget,
    phase: PhaseTracker,
    log: TurnLog,
    sink: Arc<dyn SessionSink>,
    interrupts_enabled: bool,
    charged: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("session", self.session.id())
            .field("budget", &self.budget)
            .field("phase", &self.phase.phase())
            .field("interrupts_enabled", &self.interrupts_enabled)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create new orchestrator; budget and interrupt setting come from
    /// the session config
    #[must_use]
    pub fn new(
        session: Session,
        registry: CommunicationRegistry,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        let budget = TurnBudget::new(session.config().turn_budget);
        let interrupts_enabled = session.config().enable_interrupt;
        let log = TurnLog::new(session.id().clone());
        Self {
            session,
            registry,
            budget,
            phase: PhaseTracker::new(),
            log,
            sink,
            interrupts_enabled,
            charged: false,
        }
    }

    /// Session state and handles
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Session state and handles, mutable
    #[inline]
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Current budget
    #[inline]
    #[must_use]
    pub fn budget(&self) -> TurnBudget {
        self.budget
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase.phase()
    }

    /// Whether interrupt proposals are still offered
    #[inline]
    #[must_use]
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Chained record of executed turns
    #[inline]
    #[must_use]
    pub fn log(&self) -> &TurnLog {
        &self.log
    }

    /// Run until the session ends
    pub async fn run(&mut self) -> SessionSummary {
        info!(
            session = %self.session.id(),
            budget = self.budget.remaining(),
            units = self.registry.len(),
            "session started"
        );
        let reason = match self.phase.advance(SessionPhase::Running) {
            Ok(()) => self.drive().await,
            Err(err) => {
                error!(error = %err, "session cannot start");
                EndReason::Aborted
            }
        };
        self.finish(reason)
    }

    async fn drive(&mut self) -> EndReason {
        loop {
            self.charged = false;
            match self.turn().await {
                Ok(TurnOutcome::Continue) => {}
                Ok(TurnOutcome::Finished(reason)) => return reason,
                Err(err) => {
                    if let Some(reason) = self.recover(err).await {
                        return reason;
                    }
                }
            }
        }
    }

    async fn turn(&mut self) -> Result<TurnOutcome, SessionError> {
        self.session.story_mut().checkpoint();
        self.publish_view().await?;

        if self.budget.is_exhausted() {
            self.session
                .frontend()
                .notify("Session ends here. Thank you for your participation.")
                .await?;
            return Ok(TurnOutcome::Finished(EndReason::BudgetExhausted));
        }

        if self.session.config().announce_turns {
            self.session
                .frontend()
                .notify(&format!(
                    "You have {} interactions left. The session will end after the counter reaches 0.",
                    self.budget.remaining()
                ))
                .await?;
        }

        if let Some(outcome) = self.negotiate_interrupt().await? {
            return Ok(outcome);
        }

        if self.phase.phase() == SessionPhase::Running {
            self.phase.advance(SessionPhase::Choosing)?;
        }
        self.budget.charge();
        self.charged = true;

        match self.choose().await? {
            Selection::Done => {
                self.budget.refund();
                self.charged = false;
                self.session
                    .frontend()
                    .notify(&format!(
                        "Thank you for using! You have {} turn(s).",
                        self.budget.remaining()
                    ))
                    .await?;
                Ok(TurnOutcome::Finished(EndReason::UserDone))
            }
            Selection::Unresolved(reply) => Err(SessionError::BadSelection(reply)),
            Selection::Unit(key, unit) => {
                self.phase.advance(SessionPhase::Executing)?;
                debug!(key = %key, unit = unit.description(), "executing unit");
                let consumed = unit.activate(&mut self.session).await?;
                if !consumed {
                    self.budget.refund();
                    self.charged = false;
                }
                self.record(&key, unit.as_ref(), consumed, false);
                self.phase.advance(SessionPhase::Running)?;
                Ok(TurnOutcome::Continue)
            }
        }
    }

    /// Offer the first interrupt-preferred unit; `Some` when it ran
    async fn negotiate_interrupt(&mut self) -> Result<Option<TurnOutcome>, SessionError> {
        if !self.interrupts_enabled {
            return Ok(None);
        }
        let Some(unit) = self
            .registry
            .interrupt_preferred(&self.session)
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        self.phase.advance(SessionPhase::InterruptPending)?;
        let reply = self
            .session
            .frontend()
            .ask_with(
                &format!(
                    "The creative wand want to help by: {}. Is it OK? (yes/no)",
                    unit.description()
                ),
                &yn_options(),
            )
            .await?;

        if is_yes(&reply) {
            self.phase.advance(SessionPhase::Executing)?;
            debug!(unit = unit.description(), "executing interrupt");
            let consumed = unit.activate(&mut self.session).await?;
            self.record(&reply, unit.as_ref(), consumed, true);
            self.phase.advance(SessionPhase::Running)?;
            return Ok(Some(TurnOutcome::Continue));
        }

        info!(
            unit = unit.description(),
            "interrupt declined; proposals suppressed for this session"
        );
        self.interrupts_enabled = false;
        self.phase.advance(SessionPhase::Choosing)?;
        Ok(None)
    }

    async fn choose(&mut self) -> Result<Selection, SessionError> {
        let available = self.registry.available(&self.session);
        let menu = Menu::new(
            available.iter().map(|u| u.description().to_string()),
            self.session.config().options_per_page,
        );

        let mut page = 0;
        let reply = loop {
            let (text, options) = menu.render(page);
            let reply = self.session.frontend().ask_with(&text, &options).await?;
            match reply.trim() {
                PREVIOUS_PAGE => page = page.saturating_sub(1),
                NEXT_PAGE => page = (page + 1).min(menu.page_count() - 1),
                other => break other.to_string(),
            }
        };

        let key = match menu.lookup(&reply) {
            Some(entry) => Some(entry.key.clone()),
            None if self.session.config().use_critic_for_options => {
                self.critic_fallback(&menu, &reply).await?
            }
            None => None,
        };

        Ok(match key {
            Some(key) if key == DONE_KEY => Selection::Done,
            Some(key) => match key
                .parse::<usize>()
                .ok()
                .and_then(|n| available.get(n.wrapping_sub(1)))
            {
                Some(unit) => Selection::Unit(key, Arc::clone(unit)),
                None => Selection::Unresolved(reply),
            },
            None => Selection::Unresolved(reply),
        })
    }

    /// Map free text onto a menu entry through the critic service
    async fn critic_fallback(
        &self,
        menu: &Menu,
        text: &str,
    ) -> Result<Option<String>, SessionError> {
        let fe = self.session.frontend().clone();
        fe.notify("I can't find an exact match. Let me take in what you just said...")
            .await?;

        let descriptions: Vec<String> = menu
            .entries()
            .iter()
            .map(|e| e.description.clone())
            .filter(|d| d.chars().count() > MIN_CRITIC_DESCRIPTION)
            .collect();
        if descriptions.is_empty() {
            debug!("no menu entry long enough for critic matching");
            return Ok(None);
        }

        let scores = self
            .session
            .story()
            .score_lines(descriptions, vec![text.to_string()], CRITIC_OPTION_THRESHOLD)
            .await?;
        let best = scores
            .get(text)
            .and_then(|m| m.iter().max_by(|a, b| a.1.total_cmp(b.1)))
            .map(|(description, _)| description.clone());
        let Some(best) = best else {
            fe.notify("I'm not sure what you want to do - Let's try again.")
                .await?;
            return Ok(None);
        };

        fe.notify(&format!("Sounds like you want to: {best}")).await?;
        if !fe.confirm("Should I go ahead?").await? {
            fe.notify("Maybe I got it wrong.").await?;
            return Ok(None);
        }
        Ok(menu.lookup_description(&best).map(|e| e.key.clone()))
    }

    /// Handle a failed turn; `Some` when the session must stop
    async fn recover(&mut self, err: SessionError) -> Option<EndReason> {
        if err.is_terminal() {
            info!(error = %err, "session ending");
            return Some(match err {
                SessionError::ReplyTimeout { .. } => EndReason::ReplyTimeout,
                _ => EndReason::TransportClosed,
            });
        }

        if self.charged {
            self.budget.refund();
            self.charged = false;
        }

        let notice = match &err {
            SessionError::Cancelled => {
                debug!("unit cancelled; turn refunded");
                "Let's start over."
            }
            SessionError::BadSelection(reply) => {
                debug!(reply = %reply, "unresolved selection; turn refunded");
                "The Wand doesn't know what to do with your input, Let's start over."
            }
            other => {
                warn!(error = %other, "turn failed; turn refunded");
                "Sorry that something went wrong. Would you mind trying again?"
            }
        };

        if self.phase.phase() != SessionPhase::Running {
            if let Err(phase_err) = self.phase.advance(SessionPhase::Running) {
                error!(error = %phase_err, "cannot resume loop");
                return Some(EndReason::Aborted);
            }
        }

        match self.session.frontend().notify(notice).await {
            Err(e) if e.is_terminal() => Some(EndReason::TransportClosed),
            _ => None,
        }
    }

    async fn publish_view(&self) -> Result<(), SessionError> {
        let view = match self.session.story().view(self.budget.remaining()) {
            Ok(view) => view,
            Err(err) => {
                warn!(error = %err, "cannot build view");
                return Ok(());
            }
        };
        match self.session.frontend().publish(&view).await {
            Err(err) if !err.is_terminal() => {
                warn!(error = %err, "view refresh failed");
                Ok(())
            }
            other => other,
        }
    }

    fn record(&self, choice: &str, unit: &dyn Communication, consumed: bool, interrupted: bool) {
        let draft = TurnDraft {
            choice: choice.to_string(),
            unit: unit.description().to_string(),
            turns_left: self.budget.remaining(),
            consumed,
            interrupted,
            state: self.session.story().state().dump().clone(),
        };
        match self.log.append(draft) {
            Ok(record) => {
                if let Err(err) = self.sink.record_turn(&record) {
                    warn!(error = %err, seq = record.seq, "sink rejected turn record");
                }
            }
            Err(err) => warn!(error = %err, "turn record not appended"),
        }
    }

    fn finish(&mut self, reason: EndReason) -> SessionSummary {
        if !self.phase.phase().is_terminal() {
            if let Err(err) = self.phase.advance(SessionPhase::Terminated) {
                warn!(error = %err, "terminating from unexpected phase");
            }
        }

        let summary = SessionSummary {
            session_id: self.session.id().clone(),
            reason,
            turns_left: self.budget.remaining(),
            turns_used: self.budget.consumed(),
            records: self.log.len(),
        };
        if let Err(err) = self
            .sink
            .save_final(&summary, self.session.story().state().dump())
        {
            warn!(error = %err, "final save failed");
        }
        info!(
            session = %summary.session_id,
            reason = ?summary.reason,
            turns_used = summary.turns_used,
            "session finished"
        );
        summary
    }
}
