//! Weighted prize selection.
//!
//! Pure over its inputs: given the campaign's active prizes in stable order
//! (ascending created_at, then id) and an rng, pick the winning segment.
//! Seed the rng to reproduce a draw sequence exactly.

use rand::Rng;

use crate::entities::prize;

/// A selector verdict. `fallback` marks the degenerate path taken when every
/// prize is at its cap (or no prize carries positive weight): the first
/// active prize wins regardless of capacity, so the player still leaves with
/// something. Callers must not cap-guard the win counter on this path.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub prize: &'a prize::Model,
    pub fallback: bool,
}

/// Weighted-random choice over `prizes`, honoring win caps.
///
/// Draws a uniform value in `[0, totalWeight)` and walks the available set
/// in the given order, subtracting each weight until the remainder reaches
/// zero. Prizes with non-positive weight contribute nothing and cannot win
/// on the normal path. Returns `None` only when no prize is active.
pub fn select<'a>(prizes: &'a [prize::Model], rng: &mut impl Rng) -> Option<Selection<'a>> {
    let first_active = prizes.iter().find(|p| p.active)?;

    let available: Vec<&prize::Model> = prizes
        .iter()
        .filter(|p| p.active && p.has_capacity() && p.weight > 0)
        .collect();

    let total_weight: i64 = available.iter().map(|p| i64::from(p.weight)).sum();
    if total_weight <= 0 {
        return Some(Selection {
            prize: first_active,
            fallback: true,
        });
    }

    let mut remaining = rng.r#gen::<f64>() * total_weight as f64;
    for candidate in available.iter().copied() {
        remaining -= f64::from(candidate.weight);
        if remaining <= 0.0 {
            return Some(Selection {
                prize: candidate,
                fallback: false,
            });
        }
    }

    // Floating-point slack can leave a hair of remainder after the last
    // subtraction; the draw belongs to the final candidate.
    available.last().copied().map(|prize| Selection {
        prize,
        fallback: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn prize(id: &str, weight: i32, max_wins: Option<i32>, win_count: i32) -> prize::Model {
        prize::Model {
            id: id.to_string(),
            campaign_id: "campaign".to_string(),
            name: id.to_string(),
            weight,
            color: "#FFD700".to_string(),
            coupon_type: "percent_off".to_string(),
            coupon_value: Some(10),
            coupon_code: None,
            max_wins,
            win_count,
            active: true,
            created_at: Utc
                .with_ymd_and_hms(2026, 1, 9, 0, 0, 0)
                .unwrap()
                .fixed_offset(),
        }
    }

    #[test]
    fn observed_frequencies_track_weights() {
        let weights = [40, 25, 15, 10, 7, 3];
        let prizes: Vec<_> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| prize(&format!("p{i}"), *w, None, 0))
            .collect();

        let mut rng = StdRng::seed_from_u64(42);
        let trials = 100_000;
        let mut tallies: HashMap<String, u32> = HashMap::new();
        for _ in 0..trials {
            let selection = select(&prizes, &mut rng).unwrap();
            assert!(!selection.fallback);
            *tallies.entry(selection.prize.id.clone()).or_default() += 1;
        }

        let total_weight: f64 = weights.iter().map(|w| f64::from(*w)).sum();
        for (i, w) in weights.iter().enumerate() {
            let observed = f64::from(tallies[&format!("p{i}")]) / f64::from(trials);
            let expected = f64::from(*w) / total_weight;
            assert!(
                (observed - expected).abs() < 0.01,
                "prize p{i}: observed {observed:.4}, expected {expected:.4}"
            );
        }
    }

    #[test]
    fn capped_out_prizes_are_skipped() {
        let prizes = vec![
            prize("exhausted", 1_000_000, Some(5), 5),
            prize("open", 1, None, 0),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let selection = select(&prizes, &mut rng).unwrap();
            assert_eq!(selection.prize.id, "open");
            assert!(!selection.fallback);
        }
    }

    #[test]
    fn all_capped_falls_back_to_first_active() {
        let prizes = vec![
            prize("first", 10, Some(3), 3),
            prize("second", 90, Some(3), 3),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let selection = select(&prizes, &mut rng).unwrap();
        assert_eq!(selection.prize.id, "first");
        assert!(selection.fallback);
    }

    #[test]
    fn zero_weight_never_wins_on_the_normal_path() {
        let prizes = vec![prize("free-rider", 0, None, 0), prize("real", 5, None, 0)];
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..1_000 {
            let selection = select(&prizes, &mut rng).unwrap();
            assert_eq!(selection.prize.id, "real");
        }
    }

    #[test]
    fn inactive_prizes_are_invisible() {
        let mut hidden = prize("hidden", 100, None, 0);
        hidden.active = false;
        let prizes = vec![hidden, prize("shown", 1, None, 0)];
        let mut rng = StdRng::seed_from_u64(1);
        let selection = select(&prizes, &mut rng).unwrap();
        assert_eq!(selection.prize.id, "shown");
    }

    #[test]
    fn no_active_prizes_yields_none() {
        let mut only = prize("off", 10, None, 0);
        only.active = false;
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select(&[only], &mut rng).is_none());
    }

    #[test]
    fn seeded_rng_reproduces_the_draw_sequence() {
        let prizes = vec![prize("a", 40, None, 0), prize("b", 60, None, 0)];
        let draws = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| select(&prizes, &mut rng).unwrap().prize.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(draws(1234), draws(1234));
    }
}
