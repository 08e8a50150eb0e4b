//! Store contracts for the bookmark list (remote) and flashcard deck (local).
//!
//! # Responsibility
//! - Define the synchronous request/response surface the engine drives.
//! - Classify store failures into per-entity skips and fatal errors.
//!
//! # Invariants
//! - Remote mutations are queued and only sent on `commit()`; outcomes are
//!   returned in queue order.
//! - `LocalStore::multi` returns one result per action, in action order.

use crate::model::intent::MutationIntent;
use crate::model::item::Item;
use crate::model::note::{Card, CardId, NewNote, Note, NoteId};
use crate::model::tags::TagSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-action outcome of a remote commit. `Ok(Some(item))` for creations.
pub type ActionOutcome = Result<Option<Item>, String>;

/// Failure reported by a store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store cannot be reached or its credentials are unusable.
    Unreachable(String),
    /// Store refused the request.
    Rejected(String),
    /// Note would duplicate an existing one.
    Duplicate(String),
    NotFound(String),
    /// Response was missing or could not be interpreted.
    Malformed(String),
}

impl StoreError {
    /// Fatal errors abort the run before any further mutation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "store_unreachable",
            Self::Rejected(_) => "store_rejected",
            Self::Duplicate(_) => "duplicate",
            Self::NotFound(_) => "not_found",
            Self::Malformed(_) => "malformed_response",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(message) => write!(f, "store unreachable: {message}"),
            Self::Rejected(message) => write!(f, "request rejected: {message}"),
            Self::Duplicate(message) => write!(f, "duplicate: {message}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::Malformed(message) => write!(f, "malformed response: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Typed note search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteQuery {
    /// Notes linked to the given item.
    ByItemId(String),
    /// Notes of `model` with url and title but no item id.
    Orphans {
        model: String,
        edited_within_days: Option<u32>,
    },
    /// Any note modified within the last `days` days.
    EditedWithin { days: u32 },
}

/// Bookmark list client.
pub trait RemoteStore {
    /// Current items of the list.
    fn list_items(&self) -> StoreResult<Vec<Item>>;
    /// Queues creation of a new item.
    fn create_item(&mut self, url: &str, title: &str, tags: &TagSet);
    /// Queues replacement of an item's tags.
    fn set_tags(&mut self, item_id: &str, tags: &TagSet);
    fn set_favorite(&mut self, item_id: &str, favorite: bool);
    fn set_archived(&mut self, item_id: &str, archived: bool);
    /// Sends every queued action as one transaction.
    fn commit(&mut self) -> StoreResult<Vec<ActionOutcome>>;
}

/// Flashcard deck client.
pub trait LocalStore {
    fn find_notes(&self, query: &NoteQuery) -> StoreResult<Vec<NoteId>>;
    /// Notes for `ids`; unknown ids are omitted.
    fn get_notes(&self, ids: &[NoteId]) -> StoreResult<Vec<Note>>;
    /// Cards for `ids`; unknown ids are omitted.
    fn get_cards(&self, ids: &[CardId]) -> StoreResult<Vec<Card>>;
    fn create_note(&mut self, note: &NewNote) -> StoreResult<NoteId>;
    /// Applies local-side intents in one round trip.
    fn multi(&mut self, actions: &[MutationIntent]) -> StoreResult<Vec<Result<(), String>>>;
}
