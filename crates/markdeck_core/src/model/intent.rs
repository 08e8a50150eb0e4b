//! Outbound mutation intents.
//!
//! Intents are plain values produced by resolvers and applied later, in
//! batches, by the applier. Re-applying an intent is expected to be a no-op.

use crate::model::item::ItemId;
use crate::model::note::{CardId, NewNote, NoteId};
use crate::model::tags::TagSet;
use serde::Serialize;
use std::collections::BTreeMap;

/// Store an intent is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSide {
    /// Flashcard deck.
    Local,
    /// Bookmark list.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationIntent {
    CreateNote(NewNote),
    /// Partial field update; fields not listed are left untouched.
    UpdateFields {
        note_id: NoteId,
        fields: BTreeMap<String, String>,
    },
    /// Full tag set replacement on a note.
    UpdateTags { note_id: NoteId, tags: TagSet },
    SetFavorite { item_id: ItemId, favorite: bool },
    SetArchived { item_id: ItemId, archived: bool },
    SetSuspended { card_id: CardId, suspended: bool },
    /// Full tag set replacement on an item.
    ReplaceItemTags { item_id: ItemId, tags: TagSet },
    SetDue { card_id: CardId, due: i64 },
}

impl MutationIntent {
    pub fn side(&self) -> StoreSide {
        match self {
            Self::SetFavorite { .. } | Self::SetArchived { .. } | Self::ReplaceItemTags { .. } => {
                StoreSide::Remote
            }
            Self::CreateNote(_)
            | Self::UpdateFields { .. }
            | Self::UpdateTags { .. }
            | Self::SetSuspended { .. }
            | Self::SetDue { .. } => StoreSide::Local,
        }
    }

    /// Short action name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateNote(_) => "create_note",
            Self::UpdateFields { .. } => "update_fields",
            Self::UpdateTags { .. } => "update_tags",
            Self::SetFavorite { .. } => "set_favorite",
            Self::SetArchived { .. } => "set_archived",
            Self::SetSuspended { .. } => "set_suspended",
            Self::ReplaceItemTags { .. } => "replace_item_tags",
            Self::SetDue { .. } => "set_due",
        }
    }

    /// Remote application order: tags, favorites, unfavorites, archives, readds.
    pub(crate) fn remote_rank(&self) -> u8 {
        match self {
            Self::ReplaceItemTags { .. } => 0,
            Self::SetFavorite { favorite: true, .. } => 1,
            Self::SetFavorite { favorite: false, .. } => 2,
            Self::SetArchived { archived: true, .. } => 3,
            Self::SetArchived { archived: false, .. } => 4,
            _ => 5,
        }
    }
}
