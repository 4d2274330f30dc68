//! Transport boundary
//!
//! The engine talks to a person only through [`Transport`]. [`Frontend`]
//! wraps a transport with the conventions every unit relies on:
//! - the reserved `"[cancel]"` reply becomes [`SessionError::Cancelled`]
//! - numeric replies are parsed, failures become `InvalidReply`
//! - option lists for yes/no/cancel are built once here

use crate::error::SessionError;
use crate::types::{ReplyOption, SessionView};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

/// Reply value that unwinds the current unit
pub const CANCEL_REPLY: &str = "[cancel]";

/// Presentation layer contract
#[async_trait]
pub trait Transport: Send + Sync {
    /// Show `message` and wait for the user's reply
    async fn request_reply(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<String, SessionError>;

    /// Show `message` without waiting
    async fn send_notice(&self, message: &str, options: &[ReplyOption])
        -> Result<(), SessionError>;

    /// Refresh document/sketch/highlight displays
    async fn publish_view(&self, _view: &SessionView) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Yes/No options
#[must_use]
pub fn yn_options() -> Vec<ReplyOption> {
    vec![ReplyOption::new("Yes", "yes"), ReplyOption::new("No", "no")]
}

/// Yes/No/Cancel options
#[must_use]
pub fn ync_options() -> Vec<ReplyOption> {
    let mut options = yn_options();
    options.push(cancel_option());
    options
}

/// Cancel-only options
#[must_use]
pub fn c_options() -> Vec<ReplyOption> {
    vec![cancel_option()]
}

/// Labelled options followed by a cancel entry
#[must_use]
pub fn options_with_cancel<I, L, V>(major: I) -> Vec<ReplyOption>
where
    I: IntoIterator<Item = (L, V)>,
    L: Into<String>,
    V: Into<String>,
{
    let mut options: Vec<ReplyOption> = major
        .into_iter()
        .map(|(label, value)| ReplyOption::new(label, value))
        .collect();
    options.push(cancel_option());
    options
}

fn cancel_option() -> ReplyOption {
    ReplyOption::new("Cancel", CANCEL_REPLY)
}

/// A reply counts as "yes" if it contains `y` or `Y` anywhere
#[inline]
#[must_use]
pub fn is_yes(reply: &str) -> bool {
    reply.contains(['y', 'Y'])
}

/// Transport handle used by the loop and by units
#[derive(Clone)]
pub struct Frontend {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Frontend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frontend").finish_non_exhaustive()
    }
}

impl Frontend {
    /// Create new frontend over `transport`
    #[inline]
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Ask with no suggested replies
    ///
    /// # Errors
    /// `Cancelled` for the reserved reply, transport errors otherwise.
    pub async fn ask(&self, message: &str) -> Result<String, SessionError> {
        self.ask_with(message, &[]).await
    }

    /// Ask with suggested replies
    ///
    /// # Errors
    /// `Cancelled` for the reserved reply, transport errors otherwise.
    pub async fn ask_with(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<String, SessionError> {
        let reply = self.transport.request_reply(message, options).await?;
        if reply.trim() == CANCEL_REPLY {
            return Err(SessionError::Cancelled);
        }
        Ok(reply)
    }

    /// Ask for a number
    ///
    /// # Errors
    /// `InvalidReply` if the trimmed reply does not parse as `T`.
    pub async fn ask_number<T: FromStr>(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<T, SessionError> {
        let reply = self.ask_with(message, options).await?;
        reply
            .trim()
            .parse()
            .map_err(|_| SessionError::InvalidReply {
                reply,
                expected: "a number",
            })
    }

    /// Yes/no question
    ///
    /// # Errors
    /// Transport errors.
    pub async fn confirm(&self, message: &str) -> Result<bool, SessionError> {
        let reply = self.ask_with(message, &yn_options()).await?;
        Ok(is_yes(&reply))
    }

    /// Send a notice
    ///
    /// # Errors
    /// Transport errors.
    pub async fn notify(&self, message: &str) -> Result<(), SessionError> {
        self.transport.send_notice(message, &[]).await
    }

    /// Send a notice carrying options
    ///
    /// # Errors
    /// Transport errors.
    pub async fn notify_with(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<(), SessionError> {
        self.transport.send_notice(message, options).await
    }

    /// Push display state
    ///
    /// # Errors
    /// Transport errors.
    pub async fn publish(&self, view: &SessionView) -> Result<(), SessionError> {
        self.transport.publish_view(view).await
    }
}
