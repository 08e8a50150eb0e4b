//! Promotion of locally created notes into bookmark items.
//!
//! # Responsibility
//! - Find orphan notes (url + title, no `item_id`) and create matching items.
//! - Link each note to its new item by writing `item_id`, `given_title` and
//!   `given_url` back onto the note.
//!
//! # Invariants
//! - Only notes without an `item_id` are ever linked; existing links are never
//!   rewritten.
//! - A failed creation leaves its note untouched for this run.

use crate::config::SyncConfig;
use crate::model::intent::MutationIntent;
use crate::model::item::Item;
use crate::model::note::{Note, NoteId, FIELD_GIVEN_TITLE, FIELD_GIVEN_URL, FIELD_ITEM_ID};
use crate::model::tags::{strip_markers, TagSet};
use crate::sync::apply::MutationApplier;
use crate::sync::store::{LocalStore, NoteQuery, RemoteStore, StoreError};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^<a href="?(.*?)"?>(.*)</a>$"#).expect("valid anchor regex"));

/// Remote creation request derived from one orphan note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRequest {
    pub url: String,
    pub title: String,
    pub tags: TagSet,
}

impl ItemRequest {
    /// Builds a request from an orphan note's fields and domain tags.
    pub fn from_note(note: &Note) -> Option<Self> {
        let title = note.field(FIELD_GIVEN_TITLE)?.to_string();
        let url = unwrap_anchor(note.field(FIELD_GIVEN_URL)?);
        Some(Self {
            url,
            title,
            tags: strip_markers(&note.tags),
        })
    }
}

/// An orphan note now linked to a freshly created item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdoptedNote {
    pub note_id: NoteId,
    pub item: Item,
}

pub struct NoteCreationBridge<'a> {
    config: &'a SyncConfig,
    applier: MutationApplier,
}

impl<'a> NoteCreationBridge<'a> {
    pub fn new(config: &'a SyncConfig) -> Self {
        Self {
            config,
            applier: MutationApplier::new(config.batch_size),
        }
    }

    /// Creates items for orphan notes and links the notes to them.
    ///
    /// # Errors
    /// - Returns fatal store errors; per-note failures are logged and skipped.
    pub fn adopt_orphans<R, L>(
        &self,
        remote: &mut R,
        local: &mut L,
    ) -> Result<Vec<AdoptedNote>, StoreError>
    where
        R: RemoteStore + ?Sized,
        L: LocalStore + ?Sized,
    {
        let orphans = self.find_orphans(local)?;
        if orphans.is_empty() {
            info!("event=bridge_orphans module=sync status=ok orphans=0");
            return Ok(Vec::new());
        }

        let mut pending = Vec::with_capacity(orphans.len());
        for note in orphans {
            match ItemRequest::from_note(&note) {
                Some(request) => pending.push((note.id, request)),
                None => info!(
                    "event=bridge_orphan module=sync status=skip note_id={} reason=missing_url_or_title",
                    note.id
                ),
            }
        }

        let requests: Vec<ItemRequest> = pending.iter().map(|(_, r)| r.clone()).collect();
        let created = self.applier.create_items(remote, &requests)?;

        let mut adopted = Vec::new();
        for ((note_id, request), result) in pending.into_iter().zip(created) {
            match result {
                Ok(mut item) => {
                    if item.given_title.trim().is_empty() {
                        item.given_title = request.title.clone();
                    }
                    if item.given_url.trim().is_empty() {
                        item.given_url = request.url.clone();
                    }
                    info!(
                        "event=bridge_orphan module=sync status=ok note_id={} item_id={}",
                        note_id, item.item_id
                    );
                    adopted.push(AdoptedNote { note_id, item });
                }
                Err(message) => error!(
                    "event=bridge_orphan module=sync status=error note_id={} error_code=create_item_failed error={}",
                    note_id, message
                ),
            }
        }

        let link_intents: Vec<MutationIntent> = adopted.iter().map(link_intent).collect();
        let report = self.applier.apply_local(local, &link_intents)?;
        info!(
            "event=bridge_orphans module=sync status=ok adopted={} link_failures={}",
            adopted.len(),
            report.failed_actions
        );
        Ok(adopted)
    }

    fn find_orphans<L: LocalStore + ?Sized>(&self, local: &L) -> Result<Vec<Note>, StoreError> {
        let query = NoteQuery::Orphans {
            model: self.config.note_model.clone(),
            edited_within_days: None,
        };
        let ids = skip_on_error(local.find_notes(&query), "find_orphans")?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let recent: Option<BTreeSet<NoteId>> = match self.config.edited_within_days {
            Some(days) => {
                let query = NoteQuery::Orphans {
                    model: self.config.note_model.clone(),
                    edited_within_days: Some(days),
                };
                Some(
                    skip_on_error(local.find_notes(&query), "find_recent_orphans")?
                        .into_iter()
                        .collect(),
                )
            }
            None => None,
        };

        let notes = skip_on_error(local.get_notes(&ids), "get_orphans")?;
        Ok(notes
            .into_iter()
            .filter(|note| note.is_orphan())
            .filter(|note| {
                let keep = recent.as_ref().map_or(true, |recent| recent.contains(&note.id));
                if !keep {
                    info!(
                        "event=bridge_orphan module=sync status=skip note_id={} reason=not_recently_edited",
                        note.id
                    );
                }
                keep
            })
            .collect())
    }
}

fn link_intent(adopted: &AdoptedNote) -> MutationIntent {
    let fields: BTreeMap<String, String> = [
        (FIELD_ITEM_ID, adopted.item.item_id.clone()),
        (FIELD_GIVEN_TITLE, adopted.item.given_title.clone()),
        (FIELD_GIVEN_URL, adopted.item.given_url.clone()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();
    MutationIntent::UpdateFields {
        note_id: adopted.note_id,
        fields,
    }
}

/// Non-fatal lookup failures degrade to "nothing to adopt".
fn skip_on_error<T: Default>(
    result: Result<T, StoreError>,
    step: &str,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            error!(
                "event=bridge_lookup module=sync status=error step={} error_code={} error={}",
                step,
                err.code(),
                err
            );
            Ok(T::default())
        }
    }
}

/// Extracts the target of a pasted `<a href="...">...</a>` link.
pub fn unwrap_anchor(url: &str) -> String {
    let trimmed = url.trim();
    match ANCHOR_RE.captures(trimmed) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| trimmed.to_string()),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{unwrap_anchor, ItemRequest};
    use crate::model::note::Note;
    use crate::model::tags::{tag_set, FAVORITE_MARKER};
    use std::collections::BTreeMap;

    #[test]
    fn unwraps_pasted_anchor() {
        assert_eq!(
            unwrap_anchor(r#"<a href="https://example.com/x">Example</a>"#),
            "https://example.com/x"
        );
        assert_eq!(
            unwrap_anchor("<a href=https://example.com/y>y</a>"),
            "https://example.com/y"
        );
        assert_eq!(unwrap_anchor("  http://plain  "), "http://plain");
    }

    #[test]
    fn request_drops_control_markers() {
        let note = Note {
            id: 4,
            model: "Pocket Article".to_string(),
            fields: BTreeMap::from([
                ("given_url".to_string(), " http://x ".to_string()),
                ("given_title".to_string(), "X".to_string()),
            ]),
            tags: tag_set(["reading", FAVORITE_MARKER]),
            cards: vec![1],
            mod_time: 0,
        };
        let request = ItemRequest::from_note(&note).expect("orphan should map to a request");
        assert_eq!(request.url, "http://x");
        assert_eq!(request.title, "X");
        assert_eq!(request.tags, tag_set(["reading"]));
    }
}
