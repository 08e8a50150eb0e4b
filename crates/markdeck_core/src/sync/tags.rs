//! Tag merge between a note and its item.
//!
//! # Responsibility
//! - Decide the domain tag set both sides should converge to.
//!
//! # Invariants
//! - Inputs are domain tag sets; control markers are projected by the caller.
//! - Outside the local-authoritative window the result is a superset of both
//!   inputs: remote tags are only dropped when the local removal provably
//!   happened after the remote side was last edited.

use crate::model::tags::TagSet;

/// Timestamps (Unix seconds) ordering the last edits on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagClock {
    /// Latest modification of any card of the note.
    pub card_mod_time: i64,
    /// End of the last run that changed the note.
    pub note_last_sync_time: i64,
    /// Latest remote edit of the item.
    pub item_time_updated: i64,
}

impl TagClock {
    /// Local changed after the last sync, and that sync saw the latest remote edit.
    pub fn local_authoritative(&self) -> bool {
        self.card_mod_time > self.note_last_sync_time
            && self.note_last_sync_time > self.item_time_updated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMerge {
    pub merged: TagSet,
    /// `true` when the local view replaced the remote one outright.
    pub local_authoritative: bool,
}

/// Merges note and item domain tags.
pub fn merge_tags(note_tags: &TagSet, item_tags: &TagSet, clock: &TagClock) -> TagMerge {
    if note_tags == item_tags {
        return TagMerge {
            merged: note_tags.clone(),
            local_authoritative: false,
        };
    }

    let local_authoritative = clock.local_authoritative();
    let mut merged = note_tags.clone();
    if !local_authoritative {
        merged.extend(item_tags.iter().cloned());
    }

    TagMerge {
        merged,
        local_authoritative,
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_tags, TagClock};
    use crate::model::tags::tag_set;

    fn clock(card_mod_time: i64, note_last_sync_time: i64, item_time_updated: i64) -> TagClock {
        TagClock {
            card_mod_time,
            note_last_sync_time,
            item_time_updated,
        }
    }

    #[test]
    fn window_keeps_local_view() {
        let merge = merge_tags(
            &tag_set(["news", "misc"]),
            &tag_set(["news", "old"]),
            &clock(100, 50, 40),
        );
        assert!(merge.local_authoritative);
        assert_eq!(merge.merged, tag_set(["misc", "news"]));
    }

    #[test]
    fn stale_sync_falls_back_to_union() {
        let merge = merge_tags(
            &tag_set(["news", "misc"]),
            &tag_set(["news", "old"]),
            &clock(100, 50, 60),
        );
        assert!(!merge.local_authoritative);
        assert_eq!(merge.merged, tag_set(["misc", "news", "old"]));
    }

    #[test]
    fn untouched_local_side_falls_back_to_union() {
        let merge = merge_tags(&tag_set(["a"]), &tag_set(["b"]), &clock(50, 50, 10));
        assert_eq!(merge.merged, tag_set(["a", "b"]));
    }

    #[test]
    fn equal_sets_are_a_no_op() {
        let tags = tag_set(["x"]);
        let merge = merge_tags(&tags, &tags, &clock(100, 50, 40));
        assert_eq!(merge.merged, tags);
        assert!(!merge.local_authoritative);
    }

    #[test]
    fn union_contains_both_sides_for_every_non_window_clock() {
        let note = tag_set(["a", "shared"]);
        let item = tag_set(["b", "shared"]);
        for (card, sync, updated) in [(0, 0, 0), (10, 20, 5), (30, 20, 25), (30, 20, 20)] {
            let clock = clock(card, sync, updated);
            assert!(!clock.local_authoritative());
            let merged = merge_tags(&note, &item, &clock).merged;
            assert!(merged.is_superset(&note));
            assert!(merged.is_superset(&item));
        }
    }
}
