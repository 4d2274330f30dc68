//! Session-level units: opening, echo, feedback, undo

use super::{Communication, UnitTag};
use crate::error::SessionError;
use crate::keys;
use crate::session::Session;
use crate::transport::{is_yes, options_with_cancel, yn_options};
use async_trait::async_trait;

const OPENING: &str = "I'm your Creative Wand, here to work together on writing a story with you.\
\n\nYou will see a list of actions available to you.\
\n\nTell me what you wish to do by typing in the word in the bracket.\
\n\nOnce you selected an action, I will further guide you through each of it.\
\n\nEnjoy the collaborative experience!";

/// Introduces the wand; proposes itself once at session start
#[derive(Debug, Clone)]
pub struct OpeningMessage {
    message: String,
}

impl Default for OpeningMessage {
    fn default() -> Self {
        Self {
            message: OPENING.to_string(),
        }
    }
}

impl OpeningMessage {
    /// With a custom message
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Communication for OpeningMessage {
    fn description(&self) -> &str {
        "Let the Wand introduce themself."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::General]
    }

    fn can_activate(&self, session: &Session) -> bool {
        !session.story().state().contains(keys::DID_OPENING)
    }

    fn confidence_to_interrupt(&self, session: &Session) -> f64 {
        if self.can_activate(session) {
            1.0
        } else {
            0.0
        }
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        session.frontend().notify(&self.message).await?;
        session.story_mut().state_mut().set(keys::DID_OPENING, true);
        Ok(false)
    }
}

/// Repeats what the user says
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

#[async_trait]
impl Communication for Echo {
    fn description(&self) -> &str {
        "Let Creative Wand repeat what you tell them."
    }

    fn can_activate(&self, _session: &Session) -> bool {
        true
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let fe = session.frontend();
        let said = fe.ask("Say something:").await?;
        fe.notify(&format!("You said: {said}")).await?;
        Ok(true)
    }
}

/// Asks a study question; never consumes a turn
#[derive(Debug, Clone)]
pub struct Feedback {
    description: String,
    question: String,
    options: Vec<String>,
}

impl Default for Feedback {
    fn default() -> Self {
        Self::new(
            "Report goal completion.",
            "Which subgoal did we achieve?",
            [
                "Start by talking about Business",
                "Ending in talking about Sports",
                "Mentioning Soccer",
            ],
        )
    }
}

impl Feedback {
    /// Create new feedback question; empty `options` means free text
    #[must_use]
    pub fn new<I, S>(description: impl Into<String>, question: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            description: description.into(),
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Communication for Feedback {
    fn description(&self) -> &str {
        &self.description
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::General]
    }

    fn can_activate(&self, _session: &Session) -> bool {
        true
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let fe = session.frontend();
        let question = format!("The creative wand is wondering: {}", self.question);
        let answer = if self.options.is_empty() {
            fe.ask(&question).await?
        } else {
            let options = options_with_cancel(self.options.iter().map(|o| (o.clone(), o.clone())));
            fe.ask_with(&question, &options).await?
        };
        fe.notify(&format!("You answered \"{answer}\". Thank you!"))
            .await?;
        Ok(false)
    }
}

/// Reverts the previous turn
#[derive(Debug, Clone, Copy, Default)]
pub struct Undo;

#[async_trait]
impl Communication for Undo {
    fn description(&self) -> &str {
        "Undo."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::General]
    }

    fn can_activate(&self, session: &Session) -> bool {
        session.story().can_undo()
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let fe = session.frontend().clone();
        let reply = fe
            .ask_with("Should I revert the last change?", &yn_options())
            .await?;
        if is_yes(&reply) && session.story_mut().undo() {
            fe.notify("Done!").await?;
            Ok(true)
        } else {
            fe.notify("Sure.").await?;
            Ok(false)
        }
    }
}
