//! Concurrent session registry
//!
//! Each session runs its orchestrator on its own tokio task and talks to
//! the outside world through a [`ChannelTransport`]:
//! - prompts, notices, views and the final summary go out on an
//!   unbounded channel as [`Outbound`] messages
//! - replies come back through [`SessionManager::deliver_reply`], which
//!   completes the oneshot armed by the waiting prompt
//!
//! A reply that arrives while nothing is waiting is dropped. Destroying a
//! session closes its reply slot, so the blocked prompt wakes up with
//! `SessionEnded` and the loop terminates with a final save.

use crate::blueprint::SessionBlueprint;
use crate::error::SessionError;
use crate::transport::Transport;
use crate::types::{ReplyOption, SessionId, SessionSummary, SessionView};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Message from a session to its presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Waiting for a reply
    Prompt {
        /// Text shown to the participant
        message: String,
        /// Quick replies
        options: Vec<ReplyOption>,
    },
    /// Informational message
    Notice {
        /// Text shown to the participant
        message: String,
        /// Quick replies
        options: Vec<ReplyOption>,
    },
    /// Display refresh
    View(SessionView),
    /// Session finished; nothing follows
    Ended(SessionSummary),
}

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<oneshot::Sender<String>>,
    closed: bool,
}

/// Single pending-reply slot shared by a transport and the manager
///
/// The closed flag and the waiter share one lock, so a waiter is never
/// installed after `close` has run.
#[derive(Debug, Default)]
pub struct ReplySlot {
    state: Mutex<SlotState>,
}

impl ReplySlot {
    /// Create new open slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter, replacing any stale one
    ///
    /// # Errors
    /// `SessionEnded` once the slot is closed.
    pub fn arm(&self) -> Result<oneshot::Receiver<String>, SessionError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SessionError::SessionEnded);
        }
        let (tx, rx) = oneshot::channel();
        state.pending = Some(tx);
        Ok(rx)
    }

    /// Hand `reply` to the waiter; `false` if nobody was waiting
    pub fn deliver(&self, reply: String) -> bool {
        match self.state.lock().pending.take() {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Close the slot and wake any waiter with a dropped sender
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending = None;
    }

    /// Drop the waiter without closing
    pub fn disarm(&self) {
        self.state.lock().pending = None;
    }

    /// Whether a prompt is blocked on this slot
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Whether the slot was closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Transport over an outbound channel and a [`ReplySlot`]
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    slot: Arc<ReplySlot>,
    timeout: Option<Duration>,
}

impl ChannelTransport {
    /// Create new transport; `timeout` bounds each reply wait
    #[must_use]
    pub fn new(
        outbound: mpsc::UnboundedSender<Outbound>,
        slot: Arc<ReplySlot>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            outbound,
            slot,
            timeout,
        }
    }

    fn send(&self, message: Outbound) -> Result<(), SessionError> {
        self.outbound
            .send(message)
            .map_err(|_| SessionError::SessionEnded)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn request_reply(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<String, SessionError> {
        // Armed before the prompt leaves so a fast reply is never dropped.
        let rx = self.slot.arm()?;
        self.send(Outbound::Prompt {
            message: message.to_string(),
            options: options.to_vec(),
        })?;

        match self.timeout {
            None => rx.await.map_err(|_| SessionError::SessionEnded),
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply.map_err(|_| SessionError::SessionEnded),
                Err(_) => {
                    self.slot.disarm();
                    Err(SessionError::ReplyTimeout {
                        secs: limit.as_secs(),
                    })
                }
            },
        }
    }

    async fn send_notice(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<(), SessionError> {
        self.send(Outbound::Notice {
            message: message.to_string(),
            options: options.to_vec(),
        })
    }

    async fn publish_view(&self, view: &SessionView) -> Result<(), SessionError> {
        self.send(Outbound::View(view.clone()))
    }
}

struct ManagedSession {
    slot: Arc<ReplySlot>,
    task: JoinHandle<SessionSummary>,
}

/// Live sessions keyed by id
pub struct SessionManager {
    sessions: DashMap<SessionId, ManagedSession>,
    blueprint: SessionBlueprint,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("blueprint", &self.blueprint)
            .finish()
    }
}

impl SessionManager {
    /// Create new manager building sessions from `blueprint`
    #[must_use]
    pub fn new(blueprint: SessionBlueprint) -> Self {
        Self {
            sessions: DashMap::new(),
            blueprint,
        }
    }

    /// Start a session and return its outbound stream
    ///
    /// An existing session with the same id is closed and replaced.
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Whatever [`SessionBlueprint::build`] returns.
    pub fn create(
        &self,
        id: SessionId,
    ) -> Result<mpsc::UnboundedReceiver<Outbound>, SessionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = Arc::new(ReplySlot::new());
        let transport = ChannelTransport::new(
            tx.clone(),
            Arc::clone(&slot),
            self.blueprint.config().session.reply_timeout(),
        );
        let mut orchestrator = self.blueprint.build(id.clone(), Arc::new(transport))?;

        let task = tokio::spawn(async move {
            let summary = orchestrator.run().await;
            if tx.send(Outbound::Ended(summary.clone())).is_err() {
                debug!(session = %summary.session_id, "outbound closed before end notice");
            }
            summary
        });

        let managed = ManagedSession { slot, task };
        if let Some(previous) = self.sessions.insert(id.clone(), managed) {
            warn!(session = %id, "replacing live session");
            previous.slot.close();
        }
        info!(session = %id, "session created");
        Ok(rx)
    }

    /// Close a session; the returned handle resolves to its summary
    pub fn destroy(&self, id: &SessionId) -> Option<JoinHandle<SessionSummary>> {
        let (_, managed) = self.sessions.remove(id)?;
        managed.slot.close();
        info!(session = %id, "session destroyed");
        Some(managed.task)
    }

    /// Deliver a reply; `false` if the session is unknown or not waiting
    pub fn deliver_reply(&self, id: &SessionId, reply: impl Into<String>) -> bool {
        let Some(slot) = self.sessions.get(id).map(|s| Arc::clone(&s.slot)) else {
            debug!(session = %id, "reply for unknown session");
            return false;
        };
        let delivered = slot.deliver(reply.into());
        if !delivered {
            debug!(session = %id, "reply dropped; session not waiting");
        }
        delivered
    }

    /// Whether `id` is registered
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Whether `id` is blocked on a prompt
    #[must_use]
    pub fn is_waiting(&self, id: &SessionId) -> bool {
        self.sessions
            .get(id)
            .is_some_and(|s| s.slot.is_waiting())
    }

    /// Registered sessions, finished or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// No sessions registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop entries whose task has completed; returns how many
    pub fn remove_finished(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.task.is_finished());
        before - self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_delivers_once() {
        let slot = ReplySlot::new();
        assert!(!slot.deliver("early".into()));
        let mut rx = slot.arm().unwrap();
        assert!(slot.is_waiting());
        assert!(slot.deliver("hi".into()));
        assert_eq!(rx.try_recv().unwrap(), "hi");
        assert!(!slot.is_waiting());
        assert!(!slot.deliver("late".into()));
    }

    #[test]
    fn closed_slot_refuses_waiters() {
        let slot = ReplySlot::new();
        let mut rx = slot.arm().unwrap();
        slot.close();
        assert!(slot.is_closed());
        assert!(rx.try_recv().is_err());
        assert!(matches!(slot.arm(), Err(SessionError::SessionEnded)));
    }

    #[test]
    fn arm_after_close_is_refused() {
        let slot = ReplySlot::new();
        slot.close();
        assert!(matches!(slot.arm(), Err(SessionError::SessionEnded)));
        assert!(!slot.is_waiting());
    }

    #[test]
    fn concurrent_close_never_strands_a_waiter() {
        for _ in 0..500 {
            let slot = Arc::new(ReplySlot::new());
            let armer = {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || slot.arm().ok())
            };
            let closer = {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || slot.close())
            };
            let rx = armer.join().unwrap();
            closer.join().unwrap();

            assert!(slot.is_closed());
            assert!(!slot.is_waiting());
            if let Some(mut rx) = rx {
                // Armed before the close; the sender must have been dropped.
                assert!(matches!(
                    rx.try_recv(),
                    Err(oneshot::error::TryRecvError::Closed)
                ));
            }
        }
    }

    #[tokio::test]
    async fn destroyed_slot_wakes_untimed_prompt() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let slot = Arc::new(ReplySlot::new());
        let transport = ChannelTransport::new(tx, Arc::clone(&slot), None);
        let waiting = tokio::spawn(async move { transport.request_reply("?", &[]).await });
        while !slot.is_waiting() {
            tokio::task::yield_now().await;
        }
        slot.close();
        let result = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(SessionError::SessionEnded)));
    }

    #[tokio::test]
    async fn transport_times_out() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let slot = Arc::new(ReplySlot::new());
        let transport =
            ChannelTransport::new(tx, Arc::clone(&slot), Some(Duration::from_millis(20)));
        let err = transport.request_reply("?", &[]).await.unwrap_err();
        assert!(matches!(err, SessionError::ReplyTimeout { .. }));
        assert!(!slot.is_waiting());
    }

    #[tokio::test]
    async fn dropped_receiver_ends_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let transport = ChannelTransport::new(tx, Arc::new(ReplySlot::new()), None);
        assert!(transport.send_notice("hi", &[]).await.unwrap_err().is_terminal());
    }
}
