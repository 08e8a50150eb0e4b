//! SQLite-backed flashcard deck.
//!
//! # Responsibility
//! - Persist notes (fields + tags) and their cards.
//! - Serve the `LocalStore` contract the sync engine drives.
//!
//! # Invariants
//! - A note's non-empty `item_id` field is never overwritten with another value.
//! - Two notes of the same model never share an `item_id`.
//! - Creating a note creates exactly one new card at the end of the new queue.
//! - Sync actions never change card `type` or `mod_time`.

use crate::db::DbError;
use crate::model::intent::MutationIntent;
use crate::model::note::{
    Card, CardId, CardQueue, CardType, NewNote, Note, NoteId, FIELD_GIVEN_TITLE,
    FIELD_GIVEN_URL, FIELD_ITEM_ID,
};
use crate::model::tags::TagSet;
use crate::sync::clock::{Clock, SystemClock};
use crate::sync::store::{LocalStore, NoteQuery, StoreError, StoreResult};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SECONDS_PER_DAY: i64 = 86_400;
const QUEUE_SUSPENDED: i64 = -1;
const REQUIRED_TABLES: [&str; 4] = ["notes", "note_fields", "note_tags", "cards"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Deck persistence error.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(String),
    Duplicate(String),
    /// Request or persisted row violates a deck invariant.
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Duplicate(message) => {
                write!(f, "cannot create note because it is a duplicate: {message}")
            }
            Self::InvalidData(message) => write!(f, "invalid deck data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "deck table `{table}` is missing"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => StoreError::Unreachable(err.to_string()),
            RepoError::MissingRequiredTable(table) => {
                StoreError::Unreachable(format!("deck table `{table}` is missing"))
            }
            RepoError::NotFound(what) => StoreError::NotFound(what),
            RepoError::Duplicate(message) => StoreError::Duplicate(message),
            RepoError::InvalidData(message) => StoreError::Malformed(message),
        }
    }
}

/// Flashcard deck stored in a migrated SQLite connection.
pub struct SqliteDeckStore<'conn> {
    conn: &'conn mut Connection,
    clock: Box<dyn Clock + 'conn>,
}

impl<'conn> SqliteDeckStore<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `RepoError::MissingRequiredTable` when migrations were not applied.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        for table in REQUIRED_TABLES {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self {
            conn,
            clock: Box::new(SystemClock),
        })
    }

    /// Replaces the clock used for note and card timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'conn) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn query_notes(&self, query: &NoteQuery) -> RepoResult<Vec<NoteId>> {
        let now = self.clock.now_secs();
        let cutoff = |days: u32| now - i64::from(days) * SECONDS_PER_DAY;
        let ids = match query {
            NoteQuery::ByItemId(item_id) => collect_ids(
                &*self.conn,
                "SELECT note_id FROM note_fields
                 WHERE name = ?1 AND value = ?2
                 ORDER BY note_id;",
                params![FIELD_ITEM_ID, item_id.trim()],
            )?,
            NoteQuery::Orphans {
                model,
                edited_within_days,
            } => collect_ids(
                &*self.conn,
                "SELECT n.id FROM notes n
                 WHERE n.model = ?1
                   AND n.mod_time >= ?2
                   AND TRIM(COALESCE((SELECT value FROM note_fields
                        WHERE note_id = n.id AND name = ?3), '')) = ''
                   AND TRIM(COALESCE((SELECT value FROM note_fields
                        WHERE note_id = n.id AND name = ?4), '')) <> ''
                   AND TRIM(COALESCE((SELECT value FROM note_fields
                        WHERE note_id = n.id AND name = ?5), '')) <> ''
                 ORDER BY n.id;",
                params![
                    model,
                    edited_within_days.map_or(i64::MIN, cutoff),
                    FIELD_ITEM_ID,
                    FIELD_GIVEN_URL,
                    FIELD_GIVEN_TITLE
                ],
            )?,
            NoteQuery::EditedWithin { days } => collect_ids(
                &*self.conn,
                "SELECT id FROM notes WHERE mod_time >= ?1 ORDER BY id;",
                params![cutoff(*days)],
            )?,
        };
        Ok(ids)
    }

    fn load_note(&self, note_id: NoteId) -> RepoResult<Option<Note>> {
        let row = self
            .conn
            .query_row(
                "SELECT model, mod_time FROM notes WHERE id = ?1;",
                [note_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        let Some((model, mod_time)) = row else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare_cached("SELECT name, value FROM note_fields WHERE note_id = ?1;")?;
        let fields = stmt
            .query_map([note_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<String, String>, _>>()?;

        let mut stmt = self
            .conn
            .prepare_cached("SELECT tag FROM note_tags WHERE note_id = ?1;")?;
        let tags = stmt
            .query_map([note_id], |row| row.get(0))?
            .collect::<Result<TagSet, _>>()?;

        let cards = collect_ids(
            &*self.conn,
            "SELECT id FROM cards WHERE note_id = ?1 ORDER BY id;",
            [note_id],
        )?;

        Ok(Some(Note {
            id: note_id,
            model,
            fields,
            tags,
            cards,
            mod_time,
        }))
    }

    fn load_card(&self, card_id: CardId) -> RepoResult<Option<Card>> {
        let row = self
            .conn
            .query_row(
                "SELECT note_id, type, queue, mod_time, due FROM cards WHERE id = ?1;",
                [card_id],
                |row| {
                    Ok((
                        row.get::<_, NoteId>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((note_id, type_code, queue_code, mod_time, due)) = row else {
            return Ok(None);
        };
        let card_type = CardType::from_code(type_code).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid card type `{type_code}` in cards.type"))
        })?;
        Ok(Some(Card {
            id: card_id,
            note_id,
            card_type,
            queue: CardQueue::from_code(queue_code),
            mod_time,
            due,
        }))
    }
}

/// Review-side edits made by the flashcard application, outside any sync run.
#[cfg(any(test, feature = "test-utils"))]
impl SqliteDeckStore<'_> {
    /// Overwrites a card's review state, as a review session would.
    pub fn update_card(&mut self, card: &Card) -> RepoResult<()> {
        let queue = match card.queue {
            CardQueue::Suspended => QUEUE_SUSPENDED,
            CardQueue::Other => -2,
            CardQueue::Normal => card.card_type.code(),
        };
        let changed = self.conn.execute(
            "UPDATE cards SET type = ?2, queue = ?3, due = ?4, mod_time = ?5 WHERE id = ?1;",
            params![card.id, card.card_type.code(), queue, card.due, card.mod_time],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("card {}", card.id)));
        }
        Ok(())
    }

    /// Sets a note's modification time, as an external edit would.
    pub fn touch_note(&mut self, note_id: NoteId, mod_time: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes SET mod_time = ?2 WHERE id = ?1;",
            params![note_id, mod_time],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("note {note_id}")));
        }
        Ok(())
    }
}

impl LocalStore for SqliteDeckStore<'_> {
    fn find_notes(&self, query: &NoteQuery) -> StoreResult<Vec<NoteId>> {
        Ok(self.query_notes(query)?)
    }

    fn get_notes(&self, ids: &[NoteId]) -> StoreResult<Vec<Note>> {
        let mut notes = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(note) = self.load_note(id)? {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    fn get_cards(&self, ids: &[CardId]) -> StoreResult<Vec<Card>> {
        let mut cards = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(card) = self.load_card(id)? {
                cards.push(card);
            }
        }
        Ok(cards)
    }

    fn create_note(&mut self, note: &NewNote) -> StoreResult<NoteId> {
        let now = self.clock.now_secs();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let note_id = insert_note(&tx, note, now)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(note_id)
    }

    fn multi(&mut self, actions: &[MutationIntent]) -> StoreResult<Vec<Result<(), String>>> {
        let now = self.clock.now_secs();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;

        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let result = apply_action(&tx, action, now).map_err(|err| {
                warn!(
                    "event=deck_action module=repo status=error action={} error={}",
                    action.name(),
                    err
                );
                err.to_string()
            });
            results.push(result);
        }

        tx.commit().map_err(RepoError::from)?;
        Ok(results)
    }
}

fn apply_action(tx: &Transaction<'_>, action: &MutationIntent, now: i64) -> RepoResult<()> {
    match action {
        MutationIntent::CreateNote(note) => insert_note(tx, note, now).map(|_| ()),
        MutationIntent::UpdateFields { note_id, fields } => {
            update_fields(tx, *note_id, fields, now)
        }
        MutationIntent::UpdateTags { note_id, tags } => replace_tags(tx, *note_id, tags, now),
        MutationIntent::SetSuspended { card_id, suspended } => {
            // Unsuspending puts the card back in the queue matching its type.
            let changed = tx.execute(
                "UPDATE cards
                 SET queue = CASE WHEN ?2 THEN ?3 ELSE type END
                 WHERE id = ?1;",
                params![card_id, suspended, QUEUE_SUSPENDED],
            )?;
            require_changed(changed, || format!("card {card_id}"))
        }
        MutationIntent::SetDue { card_id, due } => {
            let changed = tx.execute(
                "UPDATE cards SET due = ?2 WHERE id = ?1;",
                params![card_id, due],
            )?;
            require_changed(changed, || format!("card {card_id}"))
        }
        other => Err(RepoError::InvalidData(format!(
            "`{}` is not a deck action",
            other.name()
        ))),
    }
}

fn insert_note(tx: &Transaction<'_>, note: &NewNote, now: i64) -> RepoResult<NoteId> {
    if note.model.trim().is_empty() || note.deck.trim().is_empty() {
        return Err(RepoError::InvalidData(
            "note needs a model and a deck".to_string(),
        ));
    }
    if note.fields.values().all(|value| value.trim().is_empty()) {
        return Err(RepoError::InvalidData("cannot create note because it is empty".to_string()));
    }

    if let Some(item_id) = note
        .fields
        .get(FIELD_ITEM_ID)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
    {
        let existing: Option<NoteId> = tx
            .query_row(
                "SELECT n.id FROM notes n
                 JOIN note_fields f ON f.note_id = n.id
                 WHERE n.model = ?1 AND f.name = ?2 AND f.value = ?3
                 LIMIT 1;",
                params![note.model, FIELD_ITEM_ID, item_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            return Err(RepoError::Duplicate(format!(
                "item {item_id} is already linked to note {existing}"
            )));
        }
    }

    tx.execute(
        "INSERT INTO notes (model, deck, mod_time) VALUES (?1, ?2, ?3);",
        params![note.model, note.deck, now],
    )?;
    let note_id = tx.last_insert_rowid();

    for (name, value) in &note.fields {
        tx.execute(
            "INSERT INTO note_fields (note_id, name, value) VALUES (?1, ?2, ?3);",
            params![note_id, name, value],
        )?;
    }
    for tag in &note.tags {
        tx.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag) VALUES (?1, ?2);",
            params![note_id, tag],
        )?;
    }

    let next_due: i64 = tx.query_row(
        "SELECT COALESCE(MAX(due), -1) + 1 FROM cards WHERE type = 0;",
        [],
        |row| row.get(0),
    )?;
    tx.execute(
        "INSERT INTO cards (note_id, type, queue, due, mod_time) VALUES (?1, 0, 0, ?2, ?3);",
        params![note_id, next_due, now],
    )?;

    info!(
        "event=deck_create_note module=repo status=ok note_id={} due={}",
        note_id, next_due
    );
    Ok(note_id)
}

fn update_fields(
    tx: &Transaction<'_>,
    note_id: NoteId,
    fields: &BTreeMap<String, String>,
    now: i64,
) -> RepoResult<()> {
    ensure_note(tx, note_id)?;

    let mut changed = false;
    for (name, value) in fields {
        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM note_fields WHERE note_id = ?1 AND name = ?2;",
                params![note_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if current.as_deref() == Some(value.as_str()) {
            continue;
        }
        if name == FIELD_ITEM_ID {
            if let Some(linked) = current.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                return Err(RepoError::InvalidData(format!(
                    "note {note_id} is already linked to item {linked}"
                )));
            }
        }
        tx.execute(
            "INSERT INTO note_fields (note_id, name, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(note_id, name) DO UPDATE SET value = excluded.value;",
            params![note_id, name, value],
        )?;
        changed = true;
    }

    if changed {
        touch(tx, note_id, now)?;
    }
    Ok(())
}

fn replace_tags(tx: &Transaction<'_>, note_id: NoteId, tags: &TagSet, now: i64) -> RepoResult<()> {
    ensure_note(tx, note_id)?;

    let mut stmt = tx.prepare_cached("SELECT tag FROM note_tags WHERE note_id = ?1;")?;
    let current = stmt
        .query_map([note_id], |row| row.get(0))?
        .collect::<Result<TagSet, _>>()?;
    if &current == tags {
        return Ok(());
    }

    tx.execute("DELETE FROM note_tags WHERE note_id = ?1;", [note_id])?;
    for tag in tags {
        tx.execute(
            "INSERT INTO note_tags (note_id, tag) VALUES (?1, ?2);",
            params![note_id, tag],
        )?;
    }
    touch(tx, note_id, now)
}

fn ensure_note(tx: &Transaction<'_>, note_id: NoteId) -> RepoResult<()> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);",
        [note_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(RepoError::NotFound(format!("note {note_id}")))
    }
}

fn touch(tx: &Transaction<'_>, note_id: NoteId, now: i64) -> RepoResult<()> {
    tx.execute(
        "UPDATE notes SET mod_time = MAX(mod_time, ?2) WHERE id = ?1;",
        params![note_id, now],
    )?;
    Ok(())
}

fn require_changed(changed: usize, what: impl FnOnce() -> String) -> RepoResult<()> {
    if changed == 0 {
        Err(RepoError::NotFound(what()))
    } else {
        Ok(())
    }
}

fn collect_ids<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> RepoResult<Vec<i64>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map(params, |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists)
}
