//! Weighted random sampling over scored entries.

use crate::weights::ScoredEntry;
use rand::Rng;

/// Pick one entry with probability proportional to its weight
///
/// Draws `r` uniformly from `[0, total)` and returns the first entry whose
/// cumulative weight exceeds `r`, walking in list order. Non-positive and
/// non-finite weights never win. Returns `None` when nothing is eligible.
pub fn sample<'a, R: Rng + ?Sized>(entries: &'a [ScoredEntry], rng: &mut R) -> Option<&'a ScoredEntry> {
    sample_index(entries, rng).map(|i| &entries[i])
}

/// Same draw as [`sample`], returning the position of the winner
pub fn sample_index<R: Rng + ?Sized>(entries: &[ScoredEntry], rng: &mut R) -> Option<usize> {
    let usable = |e: &ScoredEntry| e.weight > 0.0 && e.weight.is_finite();

    let largest = entries
        .iter()
        .filter(|&e| usable(e))
        .map(|e| e.weight)
        .fold(0.0, f64::max);
    if largest <= 0.0 {
        return None;
    }

    // Weights near f64::MAX can overflow the sum; draw over them divided by
    // the largest one instead, which keeps the same proportions.
    let mut scale = 1.0;
    let mut total: f64 = entries.iter().filter(|&e| usable(e)).map(|e| e.weight).sum();
    if !total.is_finite() {
        scale = largest;
        total = entries
            .iter()
            .filter(|&e| usable(e))
            .map(|e| e.weight / scale)
            .sum();
    }

    let r = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_usable = None;
    for (index, entry) in entries.iter().enumerate() {
        if !usable(entry) {
            continue;
        }
        cumulative += entry.weight / scale;
        if cumulative > r {
            return Some(index);
        }
        last_usable = Some(index);
    }

    // Rounding can leave r a hair above the final cumulative sum
    last_usable
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn entries(weights: &[(&str, f64)]) -> Vec<ScoredEntry> {
        weights
            .iter()
            .map(|(id, weight)| ScoredEntry {
                id: id.to_string(),
                weight: *weight,
            })
            .collect()
    }

    #[test]
    fn test_empty_or_zero_total_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample(&[], &mut rng).is_none());
        assert!(sample(&entries(&[("a", 0.0), ("b", 0.0)]), &mut rng).is_none());
        assert!(sample(&entries(&[("a", -2.0)]), &mut rng).is_none());
    }

    #[test]
    fn test_single_eligible_always_wins() {
        let list = entries(&[("a", 0.0), ("b", 4.0), ("c", 0.0)]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(sample(&list, &mut rng).unwrap().id, "b");
        }
    }

    #[test]
    fn test_index_skips_ineligible_positions() {
        let list = entries(&[("a", 0.0), ("b", -1.0), ("c", 2.0)]);
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(sample_index(&list, &mut rng), Some(2));
    }

    #[test]
    fn test_same_seed_same_pick() {
        let list = entries(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let first = sample(&list, &mut StdRng::seed_from_u64(42)).unwrap().id.clone();
        let second = sample(&list, &mut StdRng::seed_from_u64(42)).unwrap().id.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_negative_and_nan_weights_never_win() {
        let list = entries(&[("neg", -5.0), ("nan", f64::NAN), ("ok", 1.0)]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(sample(&list, &mut rng).unwrap().id, "ok");
        }
    }

    #[test]
    fn test_overflowing_total_still_draws() {
        let list = entries(&[("a", f64::MAX), ("b", f64::MAX), ("c", 0.0)]);
        let mut rng = StdRng::seed_from_u64(5);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..10_000 {
            let id = sample(&list, &mut rng).unwrap().id.clone();
            *counts.entry(id).or_default() += 1;
        }

        assert!(!counts.contains_key("c"));
        let share = counts["a"] as f64 / 10_000.0;
        assert!((share - 0.5).abs() < 0.03, "a won {}", share);
    }

    #[test]
    fn test_frequencies_converge_to_weights() {
        let list = entries(&[("a", 1.0), ("b", 3.0), ("c", 6.0)]);
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 100_000;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..trials {
            let id = sample(&list, &mut rng).unwrap().id.clone();
            *counts.entry(id).or_default() += 1;
        }

        for (id, expected) in [("a", 0.1), ("b", 0.3), ("c", 0.6)] {
            let observed = counts[id] as f64 / trials as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "{}: observed {} expected {}",
                id,
                observed,
                expected
            );
        }
    }
}
