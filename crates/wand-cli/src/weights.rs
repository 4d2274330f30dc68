//! `wand weights` helpers

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use wand_sketch::{Sketch, TopicWeights};

/// Parse `Topic:start:end`
pub(crate) fn parse_sketch(text: &str) -> Result<Sketch> {
    let mut parts = text.rsplitn(3, ':');
    let (Some(end), Some(start), Some(topic)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("sketch '{text}' is not Topic:start:end");
    };
    if topic.trim().is_empty() {
        bail!("sketch '{text}' has an empty topic");
    }
    let start: usize = start
        .trim()
        .parse()
        .with_context(|| format!("bad start in '{text}'"))?;
    let end: usize = end
        .trim()
        .parse()
        .with_context(|| format!("bad end in '{text}'"))?;
    Ok(Sketch::new(topic.trim(), start, end))
}

/// One line per topic, weights to three decimals
pub(crate) fn render_weights(weights: &TopicWeights) -> String {
    let mut text = String::new();
    for (topic, curve) in weights {
        let values: Vec<String> = curve.iter().map(|w| format!("{w:.3}")).collect();
        let _ = writeln!(text, "{topic}: [{}]", values.join(", "));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sketches_parse() {
        assert_eq!(parse_sketch("Sports:0:4").unwrap(), Sketch::new("Sports", 0, 4));
        assert_eq!(
            parse_sketch("Science: fiction:1:2").unwrap(),
            Sketch::new("Science: fiction", 1, 2)
        );
        assert!(parse_sketch("Sports:0").is_err());
        assert!(parse_sketch(":0:1").is_err());
        assert!(parse_sketch("Sports:a:1").is_err());
    }

    #[test]
    fn weights_render_per_topic() {
        let weights: TopicWeights = [("Sports".to_string(), vec![0.25, 0.5, 0.25])]
            .into_iter()
            .collect();
        assert_eq!(render_weights(&weights), "Sports: [0.250, 0.500, 0.250]\n");
    }
}
