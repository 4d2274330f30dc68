//! Units that add or change story content

use super::helpers::{ask_range, first_time_intro};
use super::{Communication, UnitTag};
use crate::error::SessionError;
use crate::keys;
use crate::session::Session;
use crate::story::ContextQuery;
use crate::transport::{c_options, is_yes, options_with_cancel, ync_options, Frontend};
use crate::types::ReplyOption;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::debug;
use wand_sketch::{Sketch, TopicMix};

/// Tell the user a range was rejected; `Ok(false)` for sketch errors
async fn range_rejected(fe: &Frontend, err: SessionError) -> Result<bool, SessionError> {
    match err {
        SessionError::Sketch(e) => {
            fe.notify(&format!("I can't use that range: {e}.")).await?;
            Ok(false)
        }
        other => Err(other),
    }
}

fn capitalize(topic: &str) -> String {
    let lower = topic.trim().to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => lower,
    }
}

/// Run generation to the end of the pass, reporting each new slot
async fn write_story(session: &mut Session) -> Result<usize, SessionError> {
    let fe = session.frontend().clone();
    let mut written = 0;
    loop {
        let outcome = session.story_mut().generate_step().await?;
        if outcome.done {
            return Ok(written);
        }
        if let Some(sentence) = outcome.slot_value {
            written += 1;
            fe.notify(&format!("Working on #{}: {sentence}", outcome.index))
                .await?;
        }
    }
}

/// User adds a sketch
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicControl;

#[async_trait]
impl Communication for TopicControl {
    fn description(&self) -> &str {
        "Apply topic control."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Human, UnitTag::Elaboration, UnitTag::Global]
    }

    fn can_activate(&self, _session: &Session) -> bool {
        true
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let fe = session.frontend().clone();
        fe.notify(
            "You can let me introduce a specific topic to part of the story.\
             \n If we put multiple topics in, I will try writing a line with regard to all topics.\
             \nJust let me know the topic and where to apply.",
        )
        .await?;

        let suggested = session.story().config().suggested_topics.clone();
        let options: Vec<ReplyOption> = suggested.iter().map(ReplyOption::same).collect();
        let topic = fe
            .ask_with(
                &format!(
                    "Which topic should I introduce? Try one from [{}] or type in yours:",
                    suggested.join(", ")
                ),
                &options,
            )
            .await?;
        let topic = capitalize(&topic);

        let (start, end) = ask_range(
            session,
            "Where (line number) should I phase this topic in? ",
            "Where (line number) should I phase this topic out? ",
        )
        .await?;
        fe.notify("OK.").await?;

        let added = session
            .story_mut()
            .execute(ContextQuery::AddSketch(Sketch::new(topic.clone(), start, end)))
            .await;
        if let Err(err) = added {
            return range_rejected(&fe, err).await;
        }

        fe.notify(&format!(
            "You've added a sketch for topic {topic}! You can add more, or see updated stories by \
             asking me to write the story again!"
        ))
        .await?;
        Ok(true)
    }
}

/// Wand proposes a topic for a range
#[derive(Debug, Clone)]
pub struct TopicSuggestion {
    topics: Vec<String>,
}

impl Default for TopicSuggestion {
    fn default() -> Self {
        Self {
            topics: vec!["Business".into(), "Sports".into()],
        }
    }
}

#[async_trait]
impl Communication for TopicSuggestion {
    fn description(&self) -> &str {
        "Get a topic suggestion."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Agent, UnitTag::Elaboration, UnitTag::Global]
    }

    fn can_activate(&self, _session: &Session) -> bool {
        !self.topics.is_empty()
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "By doing this, you will initiate the Wand to provide a topic suggestion.\
                     \nOnce you are good with the topic you can then apply it to the story, \
                     so that if you ask the Wand to write the story it will write towards that topic.";
        if !first_time_intro(session, self.description(), intro).await? {
            return Ok(false);
        }
        let Some(topic) = self.topics.choose(session.rng()).cloned() else {
            return Ok(false);
        };

        let fe = session.frontend().clone();
        fe.notify(&format!("Let's use the topic '{topic}' somewhere."))
            .await?;
        let (start, end) = ask_range(
            session,
            "Where (line number) should I phase this topic in? ",
            "Where (line number) should I phase this topic out? ",
        )
        .await?;

        let reply = fe
            .ask_with(
                &format!("{topic} from {start} to {end}. Should I work on that?"),
                &ync_options(),
            )
            .await?;
        if is_yes(&reply) {
            if let Err(err) = session
                .story_mut()
                .add_sketch(Sketch::new(topic, start, end))
            {
                return range_rejected(&fe, err).await;
            }
            fe.notify("Done!").await?;
        } else {
            fe.notify("Never mind.").await?;
        }
        Ok(true)
    }
}

/// Wand writes a sentence to follow an existing one
#[derive(Debug, Clone)]
pub struct SentenceSuggestion {
    topics: Vec<String>,
}

impl Default for SentenceSuggestion {
    fn default() -> Self {
        Self {
            topics: vec!["science".into(), "sports".into()],
        }
    }
}

#[async_trait]
impl Communication for SentenceSuggestion {
    fn description(&self) -> &str {
        "Get a sentence suggestion."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Agent, UnitTag::Elaboration, UnitTag::Local]
    }

    fn can_activate(&self, session: &Session) -> bool {
        session.story().has_generated()
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "By doing this you will initiate the Wand to inspire you by give a one-point suggestion.\
                     \nIf you are good with that sentence you can select to put it into the story as suggested.";
        if !first_time_intro(session, self.description(), intro).await? {
            return Ok(false);
        }

        let document = session.story().document()?;
        let filled: Vec<usize> = (0..document.len())
            .filter(|&i| !document[i].trim().is_empty())
            .collect();
        let (Some(&index), Some(topic)) = (
            filled.choose(session.rng()),
            self.topics.choose(session.rng()).cloned(),
        ) else {
            session
                .frontend()
                .notify("There is nothing to build on yet.")
                .await?;
            return Ok(false);
        };
        let sentence = document[index].clone();

        let fe = session.frontend().clone();
        fe.notify("Loading...").await?;
        let topics: TopicMix = [(topic.clone(), 1.0)].into_iter().collect();
        let suggestion = session
            .story()
            .generate_one(sentence.clone(), topics)
            .await?;

        fe.notify(&format!(
            "What if after sentence [{index}] '{sentence}', we had something like this about \
             '{topic}': '{suggestion}'?"
        ))
        .await?;
        let reply = fe
            .ask_with("Should I include this sentence?", &ync_options())
            .await?;
        if is_yes(&reply) {
            let target = (index + 1).min(session.story().slot_count() - 1);
            session.story_mut().force_one(target, suggestion)?;
            session
                .story_mut()
                .state_mut()
                .set(keys::LAST_MODIFIED, target);
            debug!(target, "suggestion inserted");
            fe.notify("Done! You can go ahead to freeze the sentence to keep it from getting overwritten.")
                .await?;
        } else {
            fe.notify("Never mind.").await?;
        }
        Ok(true)
    }
}

/// User writes a sentence into a slot
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceSentence;

#[async_trait]
impl Communication for ReplaceSentence {
    fn description(&self) -> &str {
        "Replace a sentence."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Human, UnitTag::Elaboration, UnitTag::Local]
    }

    fn can_activate(&self, session: &Session) -> bool {
        session.story().has_generated()
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "You can write a sentence by yourself. Specify a sentence to substitute and type in \
                     the sentence, and the sentence will be in the story.\
                     \nDo note that if you choose to let the Wand rewrite the whole story, your line \
                     will be overwritten.";
        if !first_time_intro(session, self.description(), intro).await? {
            return Ok(false);
        }

        let fe = session.frontend().clone();
        let index: usize = fe
            .ask_number("Which sentence number do you want to replace? ", &c_options())
            .await?;
        if session.story().check_slot(index).is_err() {
            fe.notify(&format!("There is no sentence {index}.")).await?;
            return Ok(false);
        }
        let sentence = fe
            .ask_with(
                &format!("Write the substitute sentence for sentence {index} : "),
                &c_options(),
            )
            .await?;

        session
            .story_mut()
            .execute(ContextQuery::ForceOne {
                index,
                text: sentence,
            })
            .await?;
        let state = session.story_mut().state_mut();
        state.trigger_event(keys::JUST_FORCED);
        state.set(keys::LAST_MODIFIED, index);
        Ok(true)
    }
}

/// Wand writes the story, whole or after a freeze point
#[derive(Debug, Clone, Copy, Default)]
pub struct LetWandWrite;

#[async_trait]
impl Communication for LetWandWrite {
    fn description(&self) -> &str {
        "Let the Wand write."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::General]
    }

    fn can_activate(&self, _session: &Session) -> bool {
        true
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "The wand can write a story for you based on applied controls.\
                     \nYou can either get the whole story rewritten or only generating from a certain \
                     point, leave the previous sentences untouched.\
                     \nYou can use this multiple times for alternatives, and if you prefer the previous \
                     one, use the Undo function.";
        if !first_time_intro(session, self.description(), intro).await? {
            return Ok(false);
        }

        let fe = session.frontend().clone();
        let filled = session.story().document_filled()?;
        session.story_mut().set_freeze_mask(-1)?;

        let mode = if filled {
            let options = options_with_cancel([
                ("Rewrite every sentence.", "whole"),
                ("Only rewrite story after a certain sentence.", "part"),
            ]);
            let reply = fe
                .ask_with(
                    "I can rewrite the whole story or only after a certain sentence. Please choose an option:",
                    &options,
                )
                .await?;
            match reply.trim() {
                "whole" => WriteMode::Whole,
                "part" => WriteMode::Part,
                _ => {
                    fe.notify("Not sure what you want to do. Let's start over.")
                        .await?;
                    return Ok(false);
                }
            }
        } else {
            fe.notify("As we do not have a story written, let's create one first!")
                .await?;
            WriteMode::Whole
        };

        match mode {
            WriteMode::Whole => {
                fe.notify("OK, I'm generating parts that are not frozen by you...")
                    .await?;
                fe.notify("Loading... (May take up to half a minute)").await?;
                write_story(session).await?;
                fe.notify("Done!").await?;
            }
            WriteMode::Part => {
                let start: i64 = fe
                    .ask_number(
                        "You can freeze a sentence and every one before it and only regenerate the \
                         ones after it.\n Which sentence position? (-1 to disable and regenerate everything:)",
                        &c_options(),
                    )
                    .await?;
                fe.notify("OK. Loading...").await?;
                session
                    .story_mut()
                    .execute(ContextQuery::SetFreezeAfter { start })
                    .await?;
                write_story(session).await?;
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Whole,
    Part,
}

/// Drops sketches and freezes over a range
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearControls;

#[async_trait]
impl Communication for ClearControls {
    fn description(&self) -> &str {
        "Clear remembered controls."
    }

    fn tags(&self) -> &[UnitTag] {
        &[UnitTag::Global]
    }

    fn can_activate(&self, session: &Session) -> bool {
        session.story().has_generated()
    }

    async fn activate(&self, session: &mut Session) -> Result<bool, SessionError> {
        let intro = "As the wand will write based on the topics applied\
                     \nYou can tell the wand that you no longer need these controls.";
        if !first_time_intro(session, self.description(), intro).await? {
            return Ok(false);
        }

        let fe = session.frontend().clone();
        fe.notify(
            "You can let me start fresh on part of the story. \
             Specify an area and I will reset everything there for you.",
        )
        .await?;
        let (start, end) = ask_range(
            session,
            "Where (line number) should I start to clean up? ",
            "Where (line number) should I stop cleaning up? ",
        )
        .await?;
        fe.notify("OK.").await?;

        if let Err(err) = session
            .story_mut()
            .execute(ContextQuery::ResetArea { start, end })
            .await
        {
            return range_rejected(&fe, err).await;
        }
        fe.notify("Done! You can add things back to continue working.")
            .await?;
        Ok(true)
    }
}
