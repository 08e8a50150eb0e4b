//! Reconciliation run orchestration.
//!
//! # Responsibility
//! - Drive one run: list items, adopt orphan notes, reconcile every item of
//!   the working set against its note, then apply the accumulated plan.
//! - Stamp `time_last_synced` on notes the run changed.
//!
//! # Invariants
//! - Resolvers never touch a store; every mutation goes through `BatchPlan`.
//! - A note's `item_id` is only written when the note has none.
//! - Cancellation stops the item loop between items; accumulated intents are
//!   still applied.
//! - Fatal store errors abort before any further mutation.

use crate::config::{ConfigError, SyncConfig};
use crate::model::intent::MutationIntent;
use crate::model::item::{Item, ItemId};
use crate::model::note::{
    Card, CardId, NewNote, Note, NoteId, FIELD_ITEM_ID, FIELD_TIME_LAST_SYNCED,
};
use crate::model::tags::{strip_markers, TagSet, FAVORITE_MARKER, SUSPENDED_MARKER};
use crate::sync::apply::{ApplyReport, MutationApplier};
use crate::sync::bridge::NoteCreationBridge;
use crate::sync::cancel::CancelToken;
use crate::sync::clock::{Clock, SystemClock};
use crate::sync::favorite::resolve_favorite;
use crate::sync::lifecycle::{resolve_lifecycle, LifecycleInput};
use crate::sync::plan::BatchPlan;
use crate::sync::schedule::{assign_due, order_candidates};
use crate::sync::store::{LocalStore, NoteQuery, RemoteStore, StoreError};
use crate::sync::tags::{merge_tags, TagClock};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Run-level failure.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// A store became unusable; nothing further was applied.
    Fatal(StoreError),
    Config(ConfigError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal(err) => write!(f, "sync aborted: {err}"),
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fatal(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Fatal(value)
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub run_id: String,
    /// Items in the working set.
    pub items_seen: usize,
    pub items_reconciled: usize,
    pub items_skipped: usize,
    pub notes_created: usize,
    /// Items created remotely for orphan notes.
    pub items_created: usize,
    /// Loop stopped early on operator request.
    pub cancelled: bool,
    /// Incremental mode found nothing new; no mutation was attempted.
    pub early_exit: bool,
    /// Reconciliation intents produced, scheduling excluded.
    pub intents: usize,
    pub remote: ApplyReport,
    pub local: ApplyReport,
    /// `SetDue` mutations submitted.
    pub scheduled: usize,
    /// Notes stamped with `time_last_synced`.
    pub stamped: usize,
}

enum ItemOutcome {
    Reconciled,
    Skipped,
}

/// Per-run state that is not part of the plan.
#[derive(Default)]
struct RunState {
    plan: BatchPlan,
    current_due: BTreeMap<CardId, i64>,
    edited: Option<BTreeSet<NoteId>>,
    adopted: BTreeMap<ItemId, NoteId>,
}

pub struct ReconciliationEngine<'a, R: ?Sized, L: ?Sized> {
    config: &'a SyncConfig,
    remote: &'a mut R,
    local: &'a mut L,
    clock: Box<dyn Clock + 'a>,
}

impl<'a, R, L> ReconciliationEngine<'a, R, L>
where
    R: RemoteStore + ?Sized,
    L: LocalStore + ?Sized,
{
    pub fn new(config: &'a SyncConfig, remote: &'a mut R, local: &'a mut L) -> Self {
        Self {
            config,
            remote,
            local,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the wall clock used for `time_last_synced` stamps.
    pub fn with_clock(mut self, clock: impl Clock + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Runs one reconciliation pass.
    ///
    /// `previous_ids` enables incremental mode: only items absent from the
    /// previous snapshot, plus items just created for orphan notes, are
    /// reconciled. When both are empty the run ends without further mutation.
    ///
    /// # Errors
    /// - `SyncError::Config` when the configuration is invalid.
    /// - `SyncError::Fatal` when a store is unreachable.
    pub fn run(
        &mut self,
        previous_ids: Option<&BTreeSet<String>>,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        self.config.validate()?;
        let mut report = SyncReport {
            run_id: Uuid::new_v4().to_string(),
            ..SyncReport::default()
        };
        info!(
            "event=sync_run module=sync status=start run_id={} incremental={}",
            report.run_id,
            previous_ids.is_some()
        );

        let listed = self.remote.list_items().map_err(|err| {
            error!(
                "event=list_items module=sync status=error run_id={} error_code={} error={}",
                report.run_id,
                err.code(),
                err
            );
            SyncError::Fatal(err)
        })?;

        let mut state = RunState::default();
        let adopted =
            NoteCreationBridge::new(self.config).adopt_orphans(&mut *self.remote, &mut *self.local)?;
        report.items_created = adopted.len();

        // Adopted items are new by construction and always join the working set.
        let mut items: BTreeMap<ItemId, Item> = listed
            .into_iter()
            .filter(|item| previous_ids.map_or(true, |previous| !previous.contains(&item.item_id)))
            .map(|item| (item.item_id.clone(), item))
            .collect();
        for adoption in adopted {
            state
                .adopted
                .insert(adoption.item.item_id.clone(), adoption.note_id);
            items.insert(adoption.item.item_id.clone(), adoption.item);
        }

        if previous_ids.is_some() && items.is_empty() {
            report.early_exit = true;
            info!(
                "event=sync_run module=sync status=skip run_id={} reason=no_new_items",
                report.run_id
            );
            return Ok(report);
        }

        if let Some(days) = self.config.edited_within_days {
            let edited = self.lookup(&NoteQuery::EditedWithin { days }, "find_edited")?;
            state.edited = Some(edited.into_iter().collect());
        }

        report.items_seen = items.len();
        for item in items.values() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                warn!(
                    "event=sync_run module=sync status=skip run_id={} reason=cancelled remaining_from={}",
                    report.run_id, item.item_id
                );
                break;
            }
            match self.reconcile_item(item, &mut state)? {
                ItemOutcome::Reconciled => report.items_reconciled += 1,
                ItemOutcome::Skipped => report.items_skipped += 1,
            }
        }

        report.notes_created = state.plan.notes_created();
        report.intents = state.plan.intent_count();
        self.apply(&state, &mut report)?;

        info!(
            "event=sync_run module=sync status=ok run_id={} items={} reconciled={} skipped={} notes_created={} items_created={} intents={} remote_failed={} local_failed={} scheduled={} stamped={} cancelled={}",
            report.run_id,
            report.items_seen,
            report.items_reconciled,
            report.items_skipped,
            report.notes_created,
            report.items_created,
            report.intents,
            report.remote.failed_actions,
            report.local.failed_actions,
            report.scheduled,
            report.stamped,
            report.cancelled
        );
        Ok(report)
    }

    fn reconcile_item(
        &mut self,
        item: &Item,
        state: &mut RunState,
    ) -> Result<ItemOutcome, StoreError> {
        let Some((note, created)) = self.note_for(item, state)? else {
            return Ok(ItemOutcome::Skipped);
        };

        if let Some(edited) = &state.edited {
            if !created && !edited.contains(&note.id) {
                info!(
                    "event=reconcile_item module=sync status=skip item_id={} note_id={} reason=not_recently_edited",
                    item.item_id, note.id
                );
                return Ok(ItemOutcome::Skipped);
            }
        }
        state.plan.visit(note.id, Some(note.image()));

        let changed_fields = projected_field_changes(&note, item);
        if !changed_fields.is_empty() {
            state.plan.push(
                note.id,
                MutationIntent::UpdateFields {
                    note_id: note.id,
                    fields: changed_fields,
                },
            );
        }

        let Some(cards) = self.cards_for(&note, item)? else {
            return Ok(ItemOutcome::Skipped);
        };
        for card in &cards {
            state.current_due.insert(card.id, card.due);
        }

        for intent in resolve_note(self.config, &note, item, &cards, state) {
            state.plan.push(note.id, intent);
        }
        Ok(ItemOutcome::Reconciled)
    }

    /// Finds the note linked to `item`, creating it when there is none.
    /// The flag is `true` for a note created by this call.
    fn note_for(
        &mut self,
        item: &Item,
        state: &mut RunState,
    ) -> Result<Option<(Note, bool)>, StoreError> {
        let note_id = match state.adopted.get(&item.item_id) {
            Some(&note_id) => Some(note_id),
            None => {
                let ids = match self.local.find_notes(&NoteQuery::ByItemId(item.item_id.clone())) {
                    Ok(ids) => ids,
                    Err(err) => return skip_item(item, "find_note", err),
                };
                if ids.len() > 1 {
                    warn!(
                        "event=reconcile_item module=sync status=skip item_id={} reason=multiple_notes count={} using={}",
                        item.item_id,
                        ids.len(),
                        ids[0]
                    );
                }
                ids.first().copied()
            }
        };

        let (note_id, created) = match note_id {
            Some(note_id) => (note_id, false),
            None => {
                let created = self.local.create_note(&NewNote {
                    deck: self.config.deck.clone(),
                    model: self.config.note_model.clone(),
                    fields: item.note_fields(),
                    tags: initial_note_tags(item),
                });
                match created {
                    Ok(note_id) => {
                        info!(
                            "event=create_note module=sync status=ok item_id={} note_id={}",
                            item.item_id, note_id
                        );
                        state.plan.record_created(note_id);
                        (note_id, true)
                    }
                    Err(err) => return skip_item(item, "create_note", err),
                }
            }
        };

        match self.local.get_notes(&[note_id]) {
            Ok(notes) => match notes.into_iter().next() {
                Some(note) => Ok(Some((note, created))),
                None => skip_item(
                    item,
                    "get_note",
                    StoreError::NotFound(format!("note {note_id}")),
                ),
            },
            Err(err) => skip_item(item, "get_note", err),
        }
    }

    /// Cards of `note`; `None` when the list is missing or incomplete.
    fn cards_for(&self, note: &Note, item: &Item) -> Result<Option<Vec<Card>>, StoreError> {
        if note.cards.is_empty() {
            return skip_item(
                item,
                "get_cards",
                StoreError::Malformed(format!("note {} has no cards", note.id)),
            );
        }
        let cards = match self.local.get_cards(&note.cards) {
            Ok(cards) => cards,
            Err(err) => return skip_item(item, "get_cards", err),
        };
        if cards.len() != note.cards.len() {
            return skip_item(
                item,
                "get_cards",
                StoreError::Malformed(format!(
                    "expected {} cards, got {}",
                    note.cards.len(),
                    cards.len()
                )),
            );
        }
        Ok(Some(cards))
    }

    fn lookup(&self, query: &NoteQuery, step: &str) -> Result<Vec<NoteId>, StoreError> {
        match self.local.find_notes(query) {
            Ok(ids) => Ok(ids),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(
                    "event=find_notes module=sync status=error step={} error_code={} error={}",
                    step,
                    err.code(),
                    err
                );
                Ok(Vec::new())
            }
        }
    }

    fn apply(&mut self, state: &RunState, report: &mut SyncReport) -> Result<(), StoreError> {
        let applier = MutationApplier::new(self.config.batch_size);

        report.remote = applier.apply_remote(&mut *self.remote, &state.plan.remote_intents())?;
        report.local = applier.apply_local(&mut *self.local, state.plan.local_intents())?;

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let order = order_candidates(
            state.plan.schedule_candidates().to_vec(),
            self.config.reorder_probability,
            &mut rng,
        );
        let due_updates: Vec<MutationIntent> = assign_due(&order)
            .into_iter()
            .filter(|intent| match intent {
                MutationIntent::SetDue { card_id, due } => {
                    state.current_due.get(card_id) != Some(due)
                }
                _ => true,
            })
            .collect();
        report.scheduled = due_updates.len();
        if !due_updates.is_empty() {
            let scheduled = applier.apply_local(&mut *self.local, &due_updates)?;
            report.local.merge(scheduled);
        }

        let stamps = self.stamp_intents(&state.plan)?;
        report.stamped = stamps.len();
        if !stamps.is_empty() {
            let stamped = applier.apply_local(&mut *self.local, &stamps)?;
            report.local.merge(stamped);
        }
        Ok(())
    }

    /// `time_last_synced` updates for notes with intents or changed images.
    fn stamp_intents(&self, plan: &BatchPlan) -> Result<Vec<MutationIntent>, StoreError> {
        let visited = plan.visited_notes();
        if visited.is_empty() {
            return Ok(Vec::new());
        }
        let after: BTreeMap<NoteId, Note> = match self.local.get_notes(&visited) {
            Ok(notes) => notes.into_iter().map(|note| (note.id, note)).collect(),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(
                    "event=stamp_notes module=sync status=error error_code={} error={}",
                    err.code(),
                    err
                );
                BTreeMap::new()
            }
        };

        let now = self.clock.now_secs().to_string();
        Ok(visited
            .into_iter()
            .filter(|note_id| {
                plan.is_flagged(*note_id)
                    || after.get(note_id).map(Note::image).as_ref() != plan.before_image(*note_id)
            })
            .map(|note_id| MutationIntent::UpdateFields {
                note_id,
                fields: BTreeMap::from([(FIELD_TIME_LAST_SYNCED.to_string(), now.clone())]),
            })
            .collect())
    }
}

fn skip_item<T>(item: &Item, step: &str, err: StoreError) -> Result<Option<T>, StoreError> {
    if err.is_fatal() {
        return Err(err);
    }
    warn!(
        "event=reconcile_item module=sync status=skip item_id={} step={} error_code={} error={}",
        item.item_id,
        step,
        err.code(),
        err
    );
    Ok(None)
}

/// Tags a freshly created note starts with.
fn initial_note_tags(item: &Item) -> TagSet {
    let mut tags = strip_markers(&item.tags);
    if item.favorite {
        tags.insert(FAVORITE_MARKER.to_string());
    }
    tags
}

/// Projected item fields that differ from the note; never relinks a note.
fn projected_field_changes(note: &Note, item: &Item) -> BTreeMap<String, String> {
    item.note_fields()
        .into_iter()
        .filter(|(name, _)| !(name == FIELD_ITEM_ID && note.item_id().is_some()))
        .filter(|(name, value)| note.fields.get(name) != Some(value))
        .collect()
}

/// Runs the three resolvers for one note/item pair.
fn resolve_note(
    config: &SyncConfig,
    note: &Note,
    item: &Item,
    cards: &[Card],
    state: &mut RunState,
) -> Vec<MutationIntent> {
    let mut intents = Vec::new();
    let card_mod_time = cards.iter().map(|card| card.mod_time).max().unwrap_or(0);
    let last_sync_time = note.last_sync_time();

    let tag_merge = merge_tags(
        &strip_markers(&note.tags),
        &strip_markers(&item.tags),
        &TagClock {
            card_mod_time,
            note_last_sync_time: last_sync_time,
            item_time_updated: item.time_updated,
        },
    );

    let favorite = resolve_favorite(
        note.tags.contains(FAVORITE_MARKER),
        item.favorite,
        item.time_favorited,
        card_mod_time,
    );
    if let Some(flag) = favorite.outbound {
        intents.push(MutationIntent::SetFavorite {
            item_id: item.item_id.clone(),
            favorite: flag,
        });
    }

    let lifecycle = resolve_lifecycle(&LifecycleInput {
        cards,
        item_status: item.status,
        item_marked_suspended: item.tags.contains(SUSPENDED_MARKER),
        item_newer_than_note: item.time_updated > card_mod_time.max(last_sync_time),
        time_added: note.time_added(),
        readd_policy: config.readd_policy,
    });
    for card_id in &lifecycle.suspend_cards {
        intents.push(MutationIntent::SetSuspended {
            card_id: *card_id,
            suspended: true,
        });
    }
    if let Some(archived) = lifecycle.archived {
        intents.push(MutationIntent::SetArchived {
            item_id: item.item_id.clone(),
            archived,
        });
    }
    state.plan.schedule(lifecycle.schedule);

    let mut item_tags = tag_merge.merged.clone();
    let mut note_tags = tag_merge.merged;
    if lifecycle.suspended_marker {
        item_tags.insert(SUSPENDED_MARKER.to_string());
        note_tags.insert(SUSPENDED_MARKER.to_string());
    }
    if favorite.favorite {
        note_tags.insert(FAVORITE_MARKER.to_string());
    }
    if note_tags != note.tags {
        intents.push(MutationIntent::UpdateTags {
            note_id: note.id,
            tags: note_tags,
        });
    }
    if item_tags != item.tags {
        intents.push(MutationIntent::ReplaceItemTags {
            item_id: item.item_id.clone(),
            tags: item_tags,
        });
    }
    intents
}
