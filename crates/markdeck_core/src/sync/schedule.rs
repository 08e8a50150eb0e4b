//! New-card ordering.
//!
//! Recent additions first, with a single-pass partial shuffle so older backlog
//! items surface now and then. This is not a full Fisher-Yates shuffle: each
//! position is swapped forward with probability `p`, otherwise it keeps its
//! recency rank.

use crate::model::intent::MutationIntent;
use crate::model::note::CardId;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleCandidate {
    pub card_id: CardId,
    /// Unix seconds the linked item was added; `0` when unknown.
    pub time_added: i64,
}

/// Orders candidates most recent first, then swaps each position except the
/// last with a uniform position at or after it, with probability
/// `reorder_probability`.
pub fn order_candidates<R: Rng + ?Sized>(
    mut candidates: Vec<ScheduleCandidate>,
    reorder_probability: f64,
    rng: &mut R,
) -> Vec<ScheduleCandidate> {
    candidates.sort_by(|a, b| b.time_added.cmp(&a.time_added));

    let len = candidates.len();
    for index in 0..len.saturating_sub(1) {
        if rng.random::<f64>() >= reorder_probability {
            continue;
        }
        let other = rng.random_range(index..len);
        candidates.swap(index, other);
    }
    candidates
}

/// Dense `0..n` due positions in the given order.
pub fn assign_due(order: &[ScheduleCandidate]) -> Vec<MutationIntent> {
    order
        .iter()
        .zip(0_i64..)
        .map(|(candidate, due)| MutationIntent::SetDue {
            card_id: candidate.card_id,
            due,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{assign_due, order_candidates, ScheduleCandidate};
    use crate::model::intent::MutationIntent;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn candidates(times: &[i64]) -> Vec<ScheduleCandidate> {
        times
            .iter()
            .enumerate()
            .map(|(index, &time_added)| ScheduleCandidate {
                card_id: index as i64 + 1,
                time_added,
            })
            .collect()
    }

    #[test]
    fn zero_probability_is_pure_recency_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let ordered = order_candidates(candidates(&[10, 30, 20]), 0.0, &mut rng);
        let times: Vec<i64> = ordered.iter().map(|c| c.time_added).collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[test]
    fn reordering_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let input = candidates(&[5, 4, 3, 2, 1, 0, 9, 8]);
        let mut ordered = order_candidates(input.clone(), 1.0, &mut rng);
        ordered.sort_by_key(|c| c.card_id);
        assert_eq!(ordered, input);
    }

    #[test]
    fn same_seed_gives_same_order() {
        let input = candidates(&[1, 2, 3, 4, 5, 6]);
        let first = order_candidates(input.clone(), 0.3, &mut StdRng::seed_from_u64(3));
        let second = order_candidates(input, 0.3, &mut StdRng::seed_from_u64(3));
        assert_eq!(first, second);
    }

    #[test]
    fn empty_and_single_inputs_are_stable() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(order_candidates(Vec::new(), 0.3, &mut rng).is_empty());
        assert_eq!(order_candidates(candidates(&[9]), 1.0, &mut rng).len(), 1);
    }

    #[test]
    fn due_values_are_dense_from_zero() {
        let intents = assign_due(&candidates(&[3, 2, 1]));
        assert_eq!(
            intents,
            vec![
                MutationIntent::SetDue { card_id: 1, due: 0 },
                MutationIntent::SetDue { card_id: 2, due: 1 },
                MutationIntent::SetDue { card_id: 3, due: 2 },
            ]
        );
    }
}
