use markdeck_core::sync::schedule::{order_candidates, ScheduleCandidate};
use rand::rngs::StdRng;
use rand::SeedableRng;

const CANDIDATES: usize = 20;
const TRIALS: usize = 400;

/// Candidates whose recency rank equals their card id.
fn recency_ranked() -> Vec<ScheduleCandidate> {
    (0..CANDIDATES)
        .map(|rank| ScheduleCandidate {
            card_id: rank as i64,
            time_added: 1_000_000 - rank as i64,
        })
        .collect()
}

fn spearman(order: &[ScheduleCandidate]) -> f64 {
    let n = order.len() as f64;
    let squared: f64 = order
        .iter()
        .enumerate()
        .map(|(position, candidate)| (position as f64 - candidate.card_id as f64).powi(2))
        .sum();
    1.0 - 6.0 * squared / (n * (n * n - 1.0))
}

fn correlations(probability: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..TRIALS)
        .map(|_| spearman(&order_candidates(recency_ranked(), probability, &mut rng)))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[test]
fn partial_shuffle_keeps_a_strong_recency_bias() {
    let samples = correlations(0.3, 11);
    let avg = mean(&samples);
    let variance = samples.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / samples.len() as f64;
    let standard_error = (variance / samples.len() as f64).sqrt();

    assert!(avg > 0.4, "mean spearman {avg} should stay well above zero");
    assert!(avg / standard_error > 5.0, "bias should be statistically significant");
}

#[test]
fn most_positions_keep_their_recency_rank() {
    let mut rng = StdRng::seed_from_u64(5);
    let fixed: usize = (0..TRIALS)
        .map(|_| {
            order_candidates(recency_ranked(), 0.3, &mut rng)
                .iter()
                .enumerate()
                .filter(|(position, candidate)| candidate.card_id == *position as i64)
                .count()
        })
        .sum();
    let fraction = fixed as f64 / (TRIALS * CANDIDATES) as f64;
    assert!(fraction > 0.45, "only {fraction} of positions kept their rank");
}

#[test]
fn always_swapping_loses_the_bias() {
    let avg = mean(&correlations(1.0, 11));
    assert!(avg.abs() < 0.25, "full reshuffle should be uncorrelated, got {avg}");
}

#[test]
fn older_items_still_surface_near_the_front() {
    let mut rng = StdRng::seed_from_u64(23);
    let surfaced = (0..TRIALS)
        .filter(|_| {
            order_candidates(recency_ranked(), 0.3, &mut rng)[..3]
                .iter()
                .any(|candidate| candidate.card_id >= 10)
        })
        .count();
    assert!(surfaced > 0);
}
