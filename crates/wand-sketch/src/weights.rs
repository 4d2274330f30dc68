//! Sketch-to-weight blending
//!
//! Each sketch contributes a standard-normal bump centred on its interval.
//! Bumps of the same topic add up, then every topic curve is normalized so
//! it sums to 1.0 across the document.

use crate::sketch::{Sketch, SketchError};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Added to `end` so a single-slot sketch still has a non-zero half-width
pub const SPREAD_EPSILON: f64 = 1e-6;

/// Topic → one weight per slot
pub type TopicWeights = BTreeMap<String, Vec<f64>>;

/// Topic → weight for a single slot
pub type TopicMix = BTreeMap<String, f64>;

/// Standard normal density
#[inline]
#[must_use]
pub fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Blend sketches into per-topic weight curves of length `slot_count`
///
/// `variance` scales the distance from the interval centre before it is fed
/// to the density: larger values give a sharper peak.
///
/// Sketch bounds are not checked here. A sketch entirely outside the
/// document contributes (near) zero mass; a topic whose total mass is zero
/// is left out of the result instead of being divided by zero.
///
/// # Errors
/// `SketchError::EmptyDocument` if `slot_count == 0`.
pub fn generate_weights(
    sketches: &[Sketch],
    slot_count: usize,
    variance: f64,
) -> Result<TopicWeights, SketchError> {
    if slot_count == 0 {
        return Err(SketchError::EmptyDocument);
    }

    let mut weights = TopicWeights::new();
    for sketch in sketches {
        let curve = weights
            .entry(sketch.topic.clone())
            .or_insert_with(|| vec![0.0; slot_count]);

        let start = sketch.start as f64;
        let end = sketch.end as f64 + SPREAD_EPSILON;
        let center = (start + end) / 2.0;
        let half_width = end - center;

        for (i, slot) in curve.iter_mut().enumerate() {
            // -1 at start, +1 at end
            let relative = (i as f64 - center) / half_width;
            *slot += standard_normal_pdf(variance * relative);
        }
    }

    weights.retain(|_, curve| {
        let total: f64 = curve.iter().sum();
        if total > 0.0 && total.is_finite() {
            curve.iter_mut().for_each(|w| *w /= total);
            true
        } else {
            false
        }
    });

    Ok(weights)
}

/// Topic mix requested for slot `index`
///
/// Values are normalized across topics, contributions below
/// `0.01 / slot_count` are dropped and the remainder renormalized.
/// Returns an empty mix when no topic has weight at `index`.
#[must_use]
pub fn weights_at(weights: &TopicWeights, index: usize, slot_count: usize) -> TopicMix {
    let raw: TopicMix = weights
        .iter()
        .filter_map(|(topic, curve)| curve.get(index).map(|w| (topic.clone(), *w)))
        .collect();

    let total: f64 = raw.values().sum();
    if total <= 0.0 {
        return TopicMix::new();
    }

    let floor = 0.01 / slot_count.max(1) as f64;
    let mut mix: TopicMix = raw
        .into_iter()
        .map(|(topic, w)| (topic, w / total))
        .filter(|(_, w)| *w >= floor)
        .collect();

    let kept: f64 = mix.values().sum();
    if kept > 0.0 {
        mix.values_mut().for_each(|w| *w /= kept);
    }
    mix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argmax(curve: &[f64]) -> usize {
        curve
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn zero_slots_rejected() {
        assert_eq!(
            generate_weights(&[Sketch::new("Sports", 0, 0)], 0, 1.0),
            Err(SketchError::EmptyDocument)
        );
    }

    #[test]
    fn whole_document_sketch_peaks_in_the_middle() {
        let weights = generate_weights(&[Sketch::new("Sports", 0, 4)], 5, 1.0).unwrap();
        let curve = &weights["Sports"];
        assert_eq!(curve.len(), 5);
        assert!((curve.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(argmax(curve), 2);
        // symmetric up to the epsilon shift
        assert!((curve[0] - curve[4]).abs() < 1e-4);
        assert!((curve[1] - curve[3]).abs() < 1e-4);
    }

    #[test]
    fn single_slot_sketch_is_unimodal_at_its_index() {
        let weights = generate_weights(&[Sketch::new("World", 3, 3)], 8, 1.0).unwrap();
        let curve = &weights["World"];
        assert!(curve.iter().all(|w| w.is_finite() && *w >= 0.0));
        assert_eq!(argmax(curve), 3);
        assert!(curve[3] > 0.99);
    }

    #[test]
    fn same_topic_sketches_accumulate_before_normalizing() {
        let sketches = vec![Sketch::new("Sports", 0, 1), Sketch::new("Sports", 0, 1)];
        let doubled = generate_weights(&sketches, 6, 1.0).unwrap();
        let single = generate_weights(&sketches[..1], 6, 1.0).unwrap();
        for (a, b) in doubled["Sports"].iter().zip(&single["Sports"]) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn topics_normalize_independently() {
        let sketches = vec![Sketch::new("Business", 0, 2), Sketch::new("Sports", 6, 9)];
        let weights = generate_weights(&sketches, 10, 1.0).unwrap();
        assert_eq!(weights.len(), 2);
        for curve in weights.values() {
            assert!((curve.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
        assert!(argmax(&weights["Business"]) <= 2);
        assert!(argmax(&weights["Sports"]) >= 6);
    }

    #[test]
    fn higher_variance_sharpens_peak() {
        let sketch = [Sketch::new("Science", 2, 6)];
        let soft = generate_weights(&sketch, 9, 0.5).unwrap();
        let sharp = generate_weights(&sketch, 9, 2.0).unwrap();
        assert!(sharp["Science"][4] > soft["Science"][4]);
    }

    #[test]
    fn degenerate_topic_is_omitted() {
        // single-slot sketch far outside the document underflows to zero
        let weights = generate_weights(&[Sketch::new("Lost", 500, 500)], 5, 1.0).unwrap();
        assert!(weights.is_empty());
    }

    #[test]
    fn mix_at_slot_normalizes_and_filters() {
        let mut weights = TopicWeights::new();
        weights.insert("Business".into(), vec![0.6, 0.0]);
        weights.insert("Sports".into(), vec![0.2, 0.5]);
        weights.insert("Dust".into(), vec![0.0001, 0.0]);

        let mix = weights_at(&weights, 0, 2);
        assert!(!mix.contains_key("Dust"));
        assert!((mix.values().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((mix["Business"] - 0.75).abs() < 1e-3);

        let mix = weights_at(&weights, 1, 2);
        assert_eq!(mix.len(), 1);
        assert!((mix["Sports"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mix_is_empty_without_weights() {
        assert!(weights_at(&TopicWeights::new(), 0, 10).is_empty());
    }
}
