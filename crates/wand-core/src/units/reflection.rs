//! Units that comment on the story through the critic service

use super::helpers::{first_time_intro, highlight_with_critic, off_topic_critic, DEFAULT_CRITICS};
use super::{Communication, UnitTag};
use crate::error::SessionError;
use crate::keys;
use crate::session::Session;
use crate::transport::c_options;
use async_trait::async_trait;
use rand::seq::SliceRandom;

const REFLECT_INFO: &str = "Let's reflect on what is going wrong!\
\nI can reflect on the story on some common critics such as \"The story is too dark\", \
\"It should not be raining\".";

const THINKING: &str = "One second, thinking...";

const OFF_TOPIC_INFO: &str = "Let's reflect on what you just added in!\
\nI can reflect on whether this sentence is out of topic, to help you keep the story connected.";

fn document_filled(session: &Session) -> bool {
    session.story().document_filled().unwrap_or(false)
}

fn default_critics() -> Vec<String> {
    DEFAULT_CRITICS.iter().map(|c| (*c).to_string()).collect()
}

/// User states a problem; the wand highlights where it applies
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectTogether;

#[async_trait]
impl Communication for ReflectTogether {
    fn description(&self) -> &str {
        "Reflect together."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Human, UnitTag::Reflection, UnitTag::Global]
    }

    fn can_activate(&self, session: &Session) -> bool {
        document_filled(session)
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "If you have a comment on the story, the Wand will help you find out which part \
                     of the story this comment is pointing to.\
                     \nThe Wand will highlight these parts hinting further improvements.";
        if !first_time_intro(session, self.description(), intro).await? {
            return Ok(false);
        }

        let fe = session.frontend().clone();
        fe.notify(REFLECT_INFO).await?;
        let critic = fe
            .ask_with("In one sentence, What's going wrong?", &c_options())
            .await?;
        let critic = critic.trim();
        if critic.is_empty() {
            fe.notify("Never mind.").await?;
            return Ok(false);
        }

        if highlight_with_critic(session, critic, None, false).await? > 0 {
            fe.notify("We've highlighted places where we think things are going wrong.")
                .await?;
        } else {
            fe.notify("Looks like everything is good to me - I didn't highlight anything.")
                .await?;
        }
        Ok(true)
    }
}

/// Wand critiques with a random built-in statement and highlights
#[derive(Debug, Clone)]
pub struct QualityTip {
    critics: Vec<String>,
}

impl Default for QualityTip {
    fn default() -> Self {
        Self {
            critics: default_critics(),
        }
    }
}

#[async_trait]
impl Communication for QualityTip {
    fn description(&self) -> &str {
        "Get a story quality tip."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Agent, UnitTag::Reflection, UnitTag::Local]
    }

    fn can_activate(&self, session: &Session) -> bool {
        document_filled(session)
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "The wand will proofread the story with its own criteria and highlight places \
                     that may need work.\
                     \nAs the Wand will use one out of many possible criteria, you will get different \
                     results every time.";
        tip(session, self.description(), intro, &self.critics, false).await
    }
}

/// Like [`QualityTip`] but only reports whether anything matched
#[derive(Debug, Clone)]
pub struct HighLevelTip {
    critics: Vec<String>,
}

impl Default for HighLevelTip {
    fn default() -> Self {
        Self {
            critics: default_critics(),
        }
    }
}

#[async_trait]
impl Communication for HighLevelTip {
    fn description(&self) -> &str {
        "Get a high-level story quality tip."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Agent, UnitTag::Reflection, UnitTag::Global]
    }

    fn can_activate(&self, session: &Session) -> bool {
        document_filled(session)
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "The wand will proofread the story with its own criteria and let you know \
                     whether there are places that may need work.\
                     \nAs the Wand will use one out of many possible criteria, you will get different \
                     results every time.";
        tip(session, self.description(), intro, &self.critics, true).await
    }
}

async fn tip(
    session: &mut Session,
    description: &str,
    intro: &str,
    critics: &[String],
    dry_run: bool,
) -> Result<bool, SessionError> {
    if !first_time_intro(session, description, intro).await? {
        return Ok(false);
    }
    let Some(critic) = critics.choose(session.rng()).cloned() else {
        return Ok(false);
    };

    let fe = session.frontend().clone();
    fe.notify(THINKING).await?;
    fe.notify(&format!("Let me look into if: {critic}")).await?;

    let found = highlight_with_critic(session, &critic, None, dry_run).await?;
    let message = match (found > 0, dry_run) {
        (true, false) => format!("I've highlighted place where I think: {critic}"),
        (true, true) => format!("I found place where I think: {critic}"),
        (false, _) => format!("Looks like nothing is related to \"{critic}\"."),
    };
    fe.notify(&message).await?;
    Ok(true)
}

/// Checks whether one sentence fits a topic; wants to interrupt right
/// after the user replaced a sentence
#[derive(Debug, Clone, Copy, Default)]
pub struct OffTopicCheck;

#[async_trait]
impl Communication for OffTopicCheck {
    fn description(&self) -> &str {
        "Check off-topicness of a sentence."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Human, UnitTag::Reflection, UnitTag::Local]
    }

    fn can_activate(&self, session: &Session) -> bool {
        document_filled(session)
    }

    fn confidence_to_interrupt(&self, session: &Session) -> f64 {
        if session.story().state().peek_event(keys::JUST_FORCED) {
            1.0
        } else {
            0.0
        }
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        if !first_time_intro(
            session,
            self.description(),
            "The Wand will check whether a sentence is on a specific topic.",
        )
        .await?
        {
            return Ok(false);
        }

        let fe = session.frontend().clone();
        fe.notify(OFF_TOPIC_INFO).await?;
        let topic = fe.ask_with("Which topic?", &c_options()).await?;

        let just_forced = session
            .story_mut()
            .state_mut()
            .consume_event(keys::JUST_FORCED, false);
        let last = session
            .story()
            .state()
            .get_as::<i64>(keys::LAST_MODIFIED)?;
        let index = match last.filter(|_| just_forced) {
            Some(index) => {
                fe.notify("Looking into what you just added.").await?;
                index
            }
            None => {
                let index: i64 = fe.ask_number("Which sentence?", &c_options()).await?;
                fe.notify(&format!("Looking into sentence {index}.")).await?;
                index
            }
        };

        let mut mask = vec![false; session.story().slot_count()];
        if let Some(slot) = usize::try_from(index).ok().and_then(|i| mask.get_mut(i)) {
            *slot = true;
        }

        let critic = off_topic_critic(topic.trim());
        fe.notify(&format!("Let me look into if: {critic}")).await?;
        if highlight_with_critic(session, &critic, Some(&mask), false).await? > 0 {
            fe.notify(&format!(
                "The sentence is highlighted to the extent where I think: {critic}"
            ))
            .await?;
        } else {
            fe.notify(&format!(
                "I think this sentence seems out-of-topic, based on my thought in: {critic}"
            ))
            .await?;
        }
        Ok(true)
    }
}
