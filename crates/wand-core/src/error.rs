//! Error types for the session engine
//!
//! Provides error handling for:
//! - Session control flow (end, timeout, cancellation, bad replies)
//! - Remote gateway calls
//! - Configuration loading
//! - Turn log persistence and integrity

use crate::state_machine::SessionPhase;
use wand_sketch::SketchError;
use wand_state::StateError;

/// Main session error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport closed or session destroyed
    #[error("session ended")]
    SessionEnded,

    /// No reply arrived within the configured timeout
    #[error("no reply within {secs}s")]
    ReplyTimeout { secs: u64 },

    /// User sent the reserved cancel reply
    #[error("cancelled by user")]
    Cancelled,

    /// Menu selection could not be resolved to a unit
    #[error("unresolved selection: {0}")]
    BadSelection(String),

    /// Reply could not be interpreted
    #[error("cannot read '{reply}' as {expected}")]
    InvalidReply { reply: String, expected: &'static str },

    /// Slot index outside the document
    #[error("slot {index} out of range (slot count {slot_count})")]
    SlotOutOfRange { index: usize, slot_count: usize },

    /// Phase machine rejected a transition
    #[error("illegal phase transition: {from:?} -> {to:?}")]
    IllegalTransition { from: SessionPhase, to: SessionPhase },

    /// Sketch list error
    #[error("sketch error: {0}")]
    Sketch(#[from] SketchError),

    /// Typed state access error
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Remote service failure
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Turn log or sink error
    #[error("turn log error: {0}")]
    Log(#[from] LogError),
}

impl SessionError {
    /// Errors that stop the session loop
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionEnded | Self::ReplyTimeout { .. })
    }

    /// Check if error is a user cancellation
    #[inline]
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the loop gives the turn back after this error
    #[inline]
    #[must_use]
    pub fn refunds_turn(&self) -> bool {
        !self.is_terminal()
    }
}

/// Remote gateway errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Request could not be sent or timed out
    #[error("request failed: {0}")]
    Request(String),

    /// Service answered with a non-success status
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the contract
    #[error("cannot decode response: {0}")]
    Decode(String),

    /// No service configured for this call
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Check if error is worth retrying at a higher level
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) | Self::Unavailable(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of its allowed range
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Unit preset name not known
    #[error("unknown unit preset: {0}")]
    UnknownPreset(String),
}

/// Turn log errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Hash chain broken at record `seq`
    #[error("turn log integrity violation at record {seq}")]
    IntegrityViolation { seq: u64 },

    /// Sink I/O failure
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("cannot serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}
