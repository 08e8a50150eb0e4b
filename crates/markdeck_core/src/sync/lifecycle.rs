//! Archive/readd and suspend decisions derived from card review state.
//!
//! # Responsibility
//! - Archive unread items once any card was reviewed or suspended.
//! - Project card suspension onto the suspended marker, both ways.
//! - Collect new, unsuspended cards for new-card ordering.
//!
//! # Invariants
//! - The suspended marker reflects "any card suspended", independent of card order.
//! - Readd is only ever emitted under `ReaddPolicy::WhenUnreviewed`.

use crate::config::ReaddPolicy;
use crate::model::item::ItemStatus;
use crate::model::note::{Card, CardId, CardType};
use crate::sync::schedule::ScheduleCandidate;

/// Per-note lifecycle inputs.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleInput<'a> {
    pub cards: &'a [Card],
    pub item_status: ItemStatus,
    /// Item carries the suspended marker.
    pub item_marked_suspended: bool,
    /// Item was edited after both the last sync and the last card change.
    pub item_newer_than_note: bool,
    /// Scheduling key read from the note's fields.
    pub time_added: i64,
    pub readd_policy: ReaddPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LifecycleDecision {
    /// `Some(true)` archive, `Some(false)` readd.
    pub archived: Option<bool>,
    /// Whether the suspended marker belongs on both tag sets.
    pub suspended_marker: bool,
    /// Cards to suspend because the item was marked suspended remotely.
    pub suspend_cards: Vec<CardId>,
    pub schedule: Vec<ScheduleCandidate>,
}

pub fn resolve_lifecycle(input: &LifecycleInput<'_>) -> LifecycleDecision {
    let unread = input.item_status == ItemStatus::Unread;
    let suspend_from_item = input.item_marked_suspended && input.item_newer_than_note;

    let mut decision = LifecycleDecision::default();
    let mut archive = false;
    let mut any_reviewed = false;

    for card in input.cards {
        let reviewed = card.card_type == CardType::Review;
        any_reviewed |= reviewed;
        if reviewed && unread {
            archive = true;
        }

        let mut suspended = card.is_suspended();
        if !suspended && suspend_from_item {
            decision.suspend_cards.push(card.id);
            suspended = true;
        }

        if suspended {
            decision.suspended_marker = true;
            if unread {
                archive = true;
            }
        } else if card.card_type == CardType::New {
            decision.schedule.push(ScheduleCandidate {
                card_id: card.id,
                time_added: input.time_added,
            });
        }
    }

    decision.archived = if archive {
        Some(true)
    } else {
        readd_decision(input, any_reviewed, decision.suspended_marker)
    };
    decision
}

/// Un-archiving decision point.
///
/// Disabled by default: a card dropping back to unreviewed is ambiguous
/// (reset on purpose vs. relearning), so nothing is revived unless asked for.
fn readd_decision(
    input: &LifecycleInput<'_>,
    any_reviewed: bool,
    any_suspended: bool,
) -> Option<bool> {
    match input.readd_policy {
        ReaddPolicy::Disabled => None,
        ReaddPolicy::WhenUnreviewed => {
            let revivable = input.item_status == ItemStatus::Archived
                && !input.cards.is_empty()
                && !any_reviewed
                && !any_suspended;
            revivable.then_some(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_lifecycle, LifecycleInput};
    use crate::config::ReaddPolicy;
    use crate::model::item::ItemStatus;
    use crate::model::note::{Card, CardQueue, CardType};

    fn card(id: i64, card_type: CardType, queue: CardQueue) -> Card {
        Card {
            id,
            note_id: 1,
            card_type,
            queue,
            mod_time: 0,
            due: 0,
        }
    }

    fn input<'a>(cards: &'a [Card], status: ItemStatus) -> LifecycleInput<'a> {
        LifecycleInput {
            cards,
            item_status: status,
            item_marked_suspended: false,
            item_newer_than_note: false,
            time_added: 42,
            readd_policy: ReaddPolicy::Disabled,
        }
    }

    #[test]
    fn reviewed_card_archives_unread_item() {
        let cards = [card(1, CardType::Review, CardQueue::Normal)];
        let decision = resolve_lifecycle(&input(&cards, ItemStatus::Unread));
        assert_eq!(decision.archived, Some(true));
        assert!(!decision.suspended_marker);
        assert!(decision.schedule.is_empty());

        let archived = resolve_lifecycle(&input(&cards, ItemStatus::Archived));
        assert_eq!(archived.archived, None);
    }

    #[test]
    fn suspended_card_sets_marker_and_archives() {
        let cards = [card(1, CardType::New, CardQueue::Suspended)];
        let decision = resolve_lifecycle(&input(&cards, ItemStatus::Unread));
        assert!(decision.suspended_marker);
        assert_eq!(decision.archived, Some(true));
        assert!(decision.schedule.is_empty());
    }

    #[test]
    fn marker_does_not_depend_on_card_order() {
        let forward = [
            card(1, CardType::Learning, CardQueue::Suspended),
            card(2, CardType::Learning, CardQueue::Normal),
        ];
        let backward = [forward[1].clone(), forward[0].clone()];
        assert!(resolve_lifecycle(&input(&forward, ItemStatus::Archived)).suspended_marker);
        assert!(resolve_lifecycle(&input(&backward, ItemStatus::Archived)).suspended_marker);
    }

    #[test]
    fn new_unsuspended_cards_become_candidates() {
        let cards = [
            card(1, CardType::New, CardQueue::Normal),
            card(2, CardType::New, CardQueue::Other),
            card(3, CardType::Learning, CardQueue::Normal),
        ];
        let decision = resolve_lifecycle(&input(&cards, ItemStatus::Unread));
        let ids: Vec<i64> = decision.schedule.iter().map(|c| c.card_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(decision.schedule.iter().all(|c| c.time_added == 42));
        assert_eq!(decision.archived, None);
    }

    #[test]
    fn newer_remote_marker_suspends_cards() {
        let cards = [card(7, CardType::New, CardQueue::Normal)];
        let mut marked = input(&cards, ItemStatus::Unread);
        marked.item_marked_suspended = true;

        let stale = resolve_lifecycle(&marked);
        assert!(stale.suspend_cards.is_empty());
        assert!(!stale.suspended_marker);

        marked.item_newer_than_note = true;
        let fresh = resolve_lifecycle(&marked);
        assert_eq!(fresh.suspend_cards, vec![7]);
        assert!(fresh.suspended_marker);
        assert_eq!(fresh.archived, Some(true));
        assert!(fresh.schedule.is_empty());
    }

    #[test]
    fn readd_is_disabled_by_default() {
        let cards = [card(1, CardType::New, CardQueue::Normal)];
        let decision = resolve_lifecycle(&input(&cards, ItemStatus::Archived));
        assert_eq!(decision.archived, None);

        let mut enabled = input(&cards, ItemStatus::Archived);
        enabled.readd_policy = ReaddPolicy::WhenUnreviewed;
        assert_eq!(resolve_lifecycle(&enabled).archived, Some(false));
    }
}
