use proptest::prelude::*;
use wand_sketch::{generate_weights, weights_at, Sketch, SketchBook, SketchError};

fn argmax(curve: &[f64]) -> usize {
    curve
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn test_sports_over_five_slots_peaks_at_two() {
    let weights = generate_weights(&[Sketch::new("Sports", 0, 4)], 5, 1.0).unwrap();
    let curve = &weights["Sports"];
    assert!((curve.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert_eq!(argmax(curve), 2);
}

#[test]
fn test_remove_twice_fails_second_time() {
    let mut book = SketchBook::new();
    book.append(Sketch::new("World", 2, 5), 10).unwrap();
    book.append(Sketch::new("Sports", 0, 9), 10).unwrap();

    book.remove("World", 2, 5).unwrap();
    assert_eq!(book.len(), 1);
    assert!(matches!(
        book.remove("World", 2, 5),
        Err(SketchError::NotFound { .. })
    ));
    assert_eq!(book.len(), 1);
}

fn sketch_strategy(slot_count: usize) -> impl Strategy<Value = Sketch> {
    (0..slot_count, 0..slot_count).prop_map(|(a, b)| Sketch::new("Topic", a.min(b), a.max(b)))
}

proptest! {
    #[test]
    fn prop_single_topic_curve_is_a_distribution(
        (slot_count, sketches) in (2usize..40).prop_flat_map(|n| {
            (Just(n), prop::collection::vec(sketch_strategy(n), 1..6))
        }),
        variance in 0.25f64..4.0,
    ) {
        let weights = generate_weights(&sketches, slot_count, variance).unwrap();
        let curve = &weights["Topic"];
        prop_assert_eq!(curve.len(), slot_count);
        prop_assert!(curve.iter().all(|w| w.is_finite() && *w >= 0.0));
        prop_assert!((curve.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prop_single_slot_sketch_peaks_at_its_index(
        (slot_count, index) in (1usize..50).prop_flat_map(|n| (Just(n), 0..n)),
    ) {
        let weights = generate_weights(&[Sketch::new("Topic", index, index)], slot_count, 1.0).unwrap();
        let curve = &weights["Topic"];
        prop_assert!(curve.iter().all(|w| w.is_finite()));
        prop_assert_eq!(argmax(curve), index);

        // unimodal: non-decreasing up to the peak, non-increasing after
        for i in 1..=index {
            prop_assert!(curve[i] >= curve[i - 1]);
        }
        for i in index + 1..slot_count {
            prop_assert!(curve[i] <= curve[i - 1]);
        }
    }

    #[test]
    fn prop_slot_mix_sums_to_one_or_is_empty(
        (slot_count, sketches, index) in (2usize..30).prop_flat_map(|n| {
            (Just(n), prop::collection::vec(sketch_strategy(n), 0..4), 0..n)
        }),
    ) {
        let weights = generate_weights(&sketches, slot_count, 1.0).unwrap();
        let mix = weights_at(&weights, index, slot_count);
        if !mix.is_empty() {
            prop_assert!((mix.values().sum::<f64>() - 1.0).abs() < 1e-9);
            let floor = 0.01 / slot_count as f64;
            prop_assert!(mix.values().all(|w| *w >= floor));
        }
    }
}
