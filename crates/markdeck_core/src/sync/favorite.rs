//! Favorite flag resolution.
//!
//! The remote side stamps favorite changes (`time_favorited`); the local side
//! only has the coarser card modification time, used as a proxy for "touched
//! locally since".

/// Favorite state both sides should hold, and what must be sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteDecision {
    /// Flag the note should carry.
    pub favorite: bool,
    /// `Some(flag)` when the item must be updated.
    pub outbound: Option<bool>,
}

/// Resolves a favorite disagreement.
///
/// Remote wins only when its favorite stamp is strictly newer than the card
/// modification time; ties go to the local side.
pub fn resolve_favorite(
    note_favorited: bool,
    item_favorite: bool,
    item_time_favorited: i64,
    card_mod_time: i64,
) -> FavoriteDecision {
    if note_favorited == item_favorite {
        return FavoriteDecision {
            favorite: note_favorited,
            outbound: None,
        };
    }

    if item_time_favorited > card_mod_time {
        FavoriteDecision {
            favorite: item_favorite,
            outbound: None,
        }
    } else {
        FavoriteDecision {
            favorite: note_favorited,
            outbound: Some(note_favorited),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_favorite, FavoriteDecision};

    #[test]
    fn agreement_is_a_no_op() {
        assert_eq!(
            resolve_favorite(true, true, 500, 10),
            FavoriteDecision {
                favorite: true,
                outbound: None
            }
        );
    }

    #[test]
    fn newer_remote_flips_local_flag() {
        let decision = resolve_favorite(false, true, 200, 100);
        assert!(decision.favorite);
        assert_eq!(decision.outbound, None);
    }

    #[test]
    fn newer_local_pushes_upstream() {
        let decision = resolve_favorite(true, false, 100, 200);
        assert!(decision.favorite);
        assert_eq!(decision.outbound, Some(true));

        let unfavorite = resolve_favorite(false, true, 100, 200);
        assert!(!unfavorite.favorite);
        assert_eq!(unfavorite.outbound, Some(false));
    }

    #[test]
    fn tie_goes_to_local() {
        for note_favorited in [true, false] {
            let decision = resolve_favorite(note_favorited, !note_favorited, 150, 150);
            assert_eq!(decision.favorite, note_favorited);
            assert_eq!(decision.outbound, Some(note_favorited));
        }
    }
}
