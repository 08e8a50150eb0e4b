//! Accumulator for intents produced during one run.

use crate::model::intent::{MutationIntent, StoreSide};
use crate::model::note::{NoteId, NoteImage};
use crate::sync::schedule::ScheduleCandidate;
use std::collections::{BTreeMap, BTreeSet};

/// Everything a run decided, applied in one pass at the end.
#[derive(Debug, Default)]
pub struct BatchPlan {
    remote: Vec<MutationIntent>,
    local: Vec<MutationIntent>,
    schedule: Vec<ScheduleCandidate>,
    /// State of each visited note before the run; `None` for notes created by it.
    before_images: BTreeMap<NoteId, Option<NoteImage>>,
    /// Notes with at least one intent produced on their behalf.
    flagged: BTreeSet<NoteId>,
    notes_created: usize,
}

impl BatchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an intent produced for `note_id` and flags the note.
    pub fn push(&mut self, note_id: NoteId, intent: MutationIntent) {
        self.flagged.insert(note_id);
        match intent.side() {
            StoreSide::Remote => self.remote.push(intent),
            StoreSide::Local => self.local.push(intent),
        }
    }

    /// Remembers the pre-run image of a note; the first image wins.
    pub fn visit(&mut self, note_id: NoteId, before: Option<NoteImage>) {
        self.before_images.entry(note_id).or_insert(before);
    }

    pub fn record_created(&mut self, note_id: NoteId) {
        self.notes_created += 1;
        self.visit(note_id, None);
    }

    pub fn schedule(&mut self, candidates: impl IntoIterator<Item = ScheduleCandidate>) {
        self.schedule.extend(candidates);
    }

    /// Remote intents in application order (tags, favorites, unfavorites,
    /// archives, readds), stable within each group.
    pub fn remote_intents(&self) -> Vec<MutationIntent> {
        let mut intents = self.remote.clone();
        intents.sort_by_key(MutationIntent::remote_rank);
        intents
    }

    pub fn local_intents(&self) -> &[MutationIntent] {
        &self.local
    }

    pub fn schedule_candidates(&self) -> &[ScheduleCandidate] {
        &self.schedule
    }

    pub fn visited_notes(&self) -> Vec<NoteId> {
        self.before_images.keys().copied().collect()
    }

    pub fn before_image(&self, note_id: NoteId) -> Option<&NoteImage> {
        self.before_images.get(&note_id).and_then(Option::as_ref)
    }

    pub fn is_flagged(&self, note_id: NoteId) -> bool {
        self.flagged.contains(&note_id)
    }

    pub fn notes_created(&self) -> usize {
        self.notes_created
    }

    /// Number of reconciliation intents, scheduling excluded.
    pub fn intent_count(&self) -> usize {
        self.remote.len() + self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intent_count() == 0
    }
}
