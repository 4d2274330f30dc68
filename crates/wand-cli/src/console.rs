//! Terminal transport

use async_trait::async_trait;
use std::fmt::Write as _;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use wand_core::{ReplyOption, SessionError, SessionView, Transport, CANCEL_REPLY};

/// Reads replies from stdin, one per line, and prints everything else
pub(crate) struct ConsoleTransport {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    timeout: Option<Duration>,
}

impl ConsoleTransport {
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            timeout,
        }
    }

    async fn print(text: &str) -> Result<(), SessionError> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes())
            .await
            .map_err(|_| SessionError::SessionEnded)?;
        out.flush().await.map_err(|_| SessionError::SessionEnded)
    }

    async fn read_line(&self) -> Result<String, SessionError> {
        let mut lines = self.lines.lock().await;
        let next = match self.timeout {
            None => lines.next_line().await,
            Some(limit) => tokio::time::timeout(limit, lines.next_line())
                .await
                .map_err(|_| SessionError::ReplyTimeout {
                    secs: limit.as_secs(),
                })?,
        };
        match next {
            Ok(Some(line)) => Ok(line),
            Ok(None) | Err(_) => Err(SessionError::SessionEnded),
        }
    }
}

/// Message followed by its quick replies, one block of text
pub(crate) fn render_message(message: &str, options: &[ReplyOption]) -> String {
    let mut text = format!("\n{message}\n");
    let shown: Vec<String> = options
        .iter()
        .map(|o| {
            if o.value == CANCEL_REPLY {
                format!("{} ({CANCEL_REPLY})", o.label)
            } else if o.label == o.value {
                o.label.clone()
            } else {
                format!("{} ({})", o.label, o.value)
            }
        })
        .collect();
    if !shown.is_empty() {
        let _ = writeln!(text, "  replies: {}", shown.join(" | "));
    }
    text
}

/// Numbered story lines; frozen lines get `*`, highlighted ones `!`
pub(crate) fn render_view(view: &SessionView) -> String {
    let mut text = String::from("\n----- story -----\n");
    for (i, line) in view.document.iter().enumerate() {
        let frozen = view.freeze_mask.get(i).copied().unwrap_or(false);
        let highlight = view.highlight.get(i).copied().unwrap_or(0.0);
        let mark = match (frozen, highlight > 0.0) {
            (true, true) => "*!",
            (true, false) => "* ",
            (false, true) => " !",
            (false, false) => "  ",
        };
        let line = if line.is_empty() { "..." } else { line.as_str() };
        let _ = writeln!(text, "{mark}[{i}] {line}");
    }
    if !view.sketches.is_empty() {
        let sketches: Vec<String> = view.sketches.iter().map(ToString::to_string).collect();
        let _ = writeln!(text, "sketches: {}", sketches.join(", "));
    }
    let _ = writeln!(text, "turns left: {}", view.turns_left);
    text.push_str("-----------------\n");
    text
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn request_reply(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<String, SessionError> {
        let mut text = render_message(message, options);
        text.push_str("> ");
        Self::print(&text).await?;
        self.read_line().await
    }

    async fn send_notice(
        &self,
        message: &str,
        options: &[ReplyOption],
    ) -> Result<(), SessionError> {
        Self::print(&render_message(message, options)).await
    }

    async fn publish_view(&self, view: &SessionView) -> Result<(), SessionError> {
        Self::print(&render_view(view)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wand_sketch::Sketch;

    #[test]
    fn options_are_listed_after_the_message() {
        let options = [
            ReplyOption::new("Yes", "yes"),
            ReplyOption::same("Done"),
            ReplyOption::new("Cancel", CANCEL_REPLY),
        ];
        assert_eq!(
            render_message("Go?", &options),
            "\nGo?\n  replies: Yes (yes) | Done | Cancel ([cancel])\n"
        );
        assert_eq!(render_message("Hi", &[]), "\nHi\n");
    }

    #[test]
    fn view_marks_frozen_and_highlighted_lines() {
        let view = SessionView {
            document: vec!["A.".into(), String::new(), "C.".into()],
            sketches: vec![Sketch::new("Sports", 0, 2)],
            highlight: vec![0.0, 0.0, 0.8],
            freeze_mask: vec![true, false, false],
            turns_left: 4,
        };
        let text = render_view(&view);
        assert!(text.contains("* [0] A.\n"));
        assert!(text.contains("  [1] ...\n"));
        assert!(text.contains(" ![2] C.\n"));
        assert!(text.contains("sketches: Sports [0..=2]"));
        assert!(text.contains("turns left: 4"));
    }
}
