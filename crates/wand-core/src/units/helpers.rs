//! Behaviour shared by several units

use crate::error::SessionError;
use crate::keys;
use crate::session::Session;
use crate::transport::{c_options, is_yes, yn_options};
use tracing::debug;

/// Statements the wand critiques the story with on its own
pub const DEFAULT_CRITICS: [&str; 7] = [
    "The story is about Business.",
    "The story is about Sports.",
    "The story has a happy ending.",
    "The story has a sad ending.",
    "The story is a cliche.",
    "The story makes me feel relaxed.",
    "The story makes me excited.",
];

/// Critic statement for an on-topic check
#[must_use]
pub fn off_topic_critic(topic: &str) -> String {
    format!("This part of the story should be related to {topic}.")
}

/// Explain a unit the first time it runs and ask to go ahead
///
/// Later calls return `true` without asking.
///
/// # Errors
/// Transport errors and cancellation.
pub async fn first_time_intro(
    session: &mut Session,
    description: &str,
    intro: &str,
) -> Result<bool, SessionError> {
    let flag = keys::first_time_flag(description);
    if session.story().state().contains(&flag) {
        return Ok(true);
    }
    session.story_mut().state_mut().set(flag, true);

    let fe = session.frontend().clone();
    fe.notify("As you are using this entry for the first time, let me explain.")
        .await?;
    fe.notify(intro).await?;
    let reply = fe.ask_with("Should I go ahead?", &yn_options()).await?;
    if is_yes(&reply) {
        Ok(true)
    } else {
        fe.notify("Got it.").await?;
        Ok(false)
    }
}

/// Ask for a slot range until `start <= end`
///
/// # Errors
/// Transport errors, cancellation, non-numeric replies.
pub async fn ask_range(
    session: &Session,
    start_prompt: &str,
    end_prompt: &str,
) -> Result<(usize, usize), SessionError> {
    let fe = session.frontend();
    loop {
        let start: usize = fe.ask_number(start_prompt, &c_options()).await?;
        let end: usize = fe.ask_number(end_prompt, &c_options()).await?;
        if start <= end {
            return Ok((start, end));
        }
        fe.notify("Starting line number should be smaller than ending line number.")
            .await?;
    }
}

/// Map a critic similarity score to a highlight strength
///
/// 0.15 maps to 0 and 0.4 to 1.
#[inline]
#[must_use]
pub fn highlight_score(similarity: f64) -> f64 {
    (similarity * 4.0 - 0.6).clamp(0.0, 1.0)
}

/// Score the document against `critic` and highlight matching slots
///
/// Only slots where `mask` is true count when a mask is given. A dry run
/// still stores a highlight, but an all-zero one, so any earlier highlight
/// is cleared. Returns how many slots received a positive score.
///
/// # Errors
/// Gateway and state errors.
pub async fn highlight_with_critic(
    session: &mut Session,
    critic: &str,
    mask: Option<&[bool]>,
    dry_run: bool,
) -> Result<usize, SessionError> {
    let scores = session
        .story()
        .critic_scores(vec![critic.to_string()], 0.0)
        .await?;
    let matched = scores.get(critic).cloned().unwrap_or_default();
    let document = session.story().document()?;

    let mut coeff = vec![0.0; document.len()];
    let mut count = 0;
    for (idx, line) in document.iter().enumerate() {
        let Some(similarity) = matched.get(line) else {
            continue;
        };
        if mask.is_some_and(|m| !m.get(idx).copied().unwrap_or(false)) {
            continue;
        }
        let score = highlight_score(*similarity);
        if !dry_run {
            coeff[idx] = score;
        }
        if score > 0.0 {
            count += 1;
        }
    }

    debug!(critic, count, dry_run, "critic highlight");
    session.story_mut().set_highlight(coeff)?;
    Ok(count)
}
