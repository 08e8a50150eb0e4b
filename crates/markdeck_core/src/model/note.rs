//! Flashcard note and card models.
//!
//! # Responsibility
//! - Represent notes (fields + tags + card ids) and their cards.
//! - Expose typed accessors for the fields sync logic depends on.
//!
//! # Invariants
//! - `item_id` is written once when a note is linked and never changed.
//! - Card review state is read-only for sync code; only `due` and the
//!   suspended queue are ever written back.

use crate::model::tags::TagSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Local note identifier.
pub type NoteId = i64;
/// Local card identifier.
pub type CardId = i64;

pub const FIELD_ITEM_ID: &str = "item_id";
pub const FIELD_GIVEN_URL: &str = "given_url";
pub const FIELD_GIVEN_TITLE: &str = "given_title";
pub const FIELD_RESOLVED_URL: &str = "resolved_url";
pub const FIELD_RESOLVED_TITLE: &str = "resolved_title";
pub const FIELD_TIME_ADDED: &str = "time_added";
pub const FIELD_WORD_COUNT: &str = "word_count";
pub const FIELD_TIME_TO_READ: &str = "time_to_read";
pub const FIELD_EXCERPT: &str = "excerpt";
pub const FIELD_AUTHORS: &str = "authors";
/// Unix seconds of the end of the last run that changed this note.
pub const FIELD_TIME_LAST_SYNCED: &str = "time_last_synced";

/// Flashcard note as reported by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Note type name.
    pub model: String,
    pub fields: BTreeMap<String, String>,
    pub tags: TagSet,
    /// Card ids in store order.
    pub cards: Vec<CardId>,
    /// Unix seconds of the last note edit.
    pub mod_time: i64,
}

impl Note {
    /// Returns a trimmed field value, `None` when absent or blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Linked item id, if this note has one.
    pub fn item_id(&self) -> Option<&str> {
        self.field(FIELD_ITEM_ID)
    }

    /// A note created locally without a remote counterpart yet.
    pub fn is_orphan(&self) -> bool {
        self.item_id().is_none()
            && self.field(FIELD_GIVEN_URL).is_some()
            && self.field(FIELD_GIVEN_TITLE).is_some()
    }

    /// Last completed sync touching this note; `0` when never synced or garbled.
    pub fn last_sync_time(&self) -> i64 {
        self.numeric_field(FIELD_TIME_LAST_SYNCED)
    }

    /// Item `time_added` copied into the note; `0` when absent or invalid.
    pub fn time_added(&self) -> i64 {
        self.numeric_field(FIELD_TIME_ADDED)
    }

    /// Comparable image used for before/after dirty detection.
    pub fn image(&self) -> NoteImage {
        let mut cards = self.cards.clone();
        cards.sort_unstable();
        NoteImage {
            fields: self.fields.clone(),
            tags: self.tags.clone(),
            cards,
        }
    }

    fn numeric_field(&self, name: &str) -> i64 {
        self.field(name)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }
}

/// Order-insensitive snapshot of the observable note state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteImage {
    pub fields: BTreeMap<String, String>,
    pub tags: TagSet,
    pub cards: Vec<CardId>,
}

/// Review state of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    New,
    Learning,
    Review,
    Relearning,
}

impl CardType {
    /// Maps the numeric card type used by flashcard collections.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::New),
            1 => Some(Self::Learning),
            2 => Some(Self::Review),
            3 => Some(Self::Relearning),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::New => 0,
            Self::Learning => 1,
            Self::Review => 2,
            Self::Relearning => 3,
        }
    }
}

/// Scheduling queue of a card, reduced to what sync needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardQueue {
    Normal,
    Suspended,
    /// Buried or otherwise parked.
    Other,
}

impl CardQueue {
    pub fn from_code(code: i64) -> Self {
        match code {
            -1 => Self::Suspended,
            code if code < 0 => Self::Other,
            _ => Self::Normal,
        }
    }
}

/// One reviewable unit of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub queue: CardQueue,
    /// Unix seconds of the last change to this card.
    pub mod_time: i64,
    /// Position in the new-card queue.
    pub due: i64,
}

impl Card {
    pub fn is_suspended(&self) -> bool {
        self.queue == CardQueue::Suspended
    }
}

/// Payload for creating a note linked to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub deck: String,
    pub model: String,
    pub fields: BTreeMap<String, String>,
    pub tags: TagSet,
}

#[cfg(test)]
mod tests {
    use super::{CardQueue, CardType, Note, FIELD_ITEM_ID, FIELD_TIME_LAST_SYNCED};
    use crate::model::tags::TagSet;
    use std::collections::BTreeMap;

    fn note(fields: &[(&str, &str)]) -> Note {
        Note {
            id: 1,
            model: "Pocket Article".to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            tags: TagSet::new(),
            cards: vec![3, 1, 2],
            mod_time: 0,
        }
    }

    #[test]
    fn orphan_requires_url_and_title_without_item_id() {
        let orphan = note(&[("given_url", "http://x"), ("given_title", "X")]);
        assert!(orphan.is_orphan());

        let linked = note(&[
            ("given_url", "http://x"),
            ("given_title", "X"),
            (FIELD_ITEM_ID, "77"),
        ]);
        assert!(!linked.is_orphan());
        assert_eq!(linked.item_id(), Some("77"));

        let untitled = note(&[("given_url", "http://x"), ("given_title", "  ")]);
        assert!(!untitled.is_orphan());
    }

    #[test]
    fn garbled_sync_stamp_reads_as_zero() {
        assert_eq!(note(&[(FIELD_TIME_LAST_SYNCED, "abc")]).last_sync_time(), 0);
        assert_eq!(note(&[(FIELD_TIME_LAST_SYNCED, "120")]).last_sync_time(), 120);
        assert_eq!(note(&[]).time_added(), 0);
    }

    #[test]
    fn image_sorts_card_ids() {
        assert_eq!(note(&[]).image().cards, vec![1, 2, 3]);
    }

    #[test]
    fn queue_codes_map_to_reduced_states() {
        assert_eq!(CardQueue::from_code(-1), CardQueue::Suspended);
        assert_eq!(CardQueue::from_code(-2), CardQueue::Other);
        assert_eq!(CardQueue::from_code(2), CardQueue::Normal);
        assert_eq!(CardType::from_code(2), Some(CardType::Review));
        assert_eq!(CardType::from_code(9), None);
    }
}
