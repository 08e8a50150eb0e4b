//! Batched application of mutation intents to both stores.
//!
//! # Responsibility
//! - Split intents into fixed-size batches, one store round trip each.
//! - Log per-action and per-batch failures without retrying them.
//!
//! # Invariants
//! - Partially applied batches are never rolled back; a later run converges
//!   because intents are idempotent.
//! - Only fatal store errors abort; everything else is counted and logged.

use crate::model::intent::{MutationIntent, StoreSide};
use crate::model::item::Item;
use crate::sync::bridge::ItemRequest;
use crate::sync::store::{LocalStore, RemoteStore, StoreError};
use log::{error, info, warn};

/// Counters for one application pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub submitted: usize,
    pub failed_actions: usize,
    pub failed_batches: usize,
}

impl ApplyReport {
    pub fn succeeded(&self) -> usize {
        self.submitted.saturating_sub(self.failed_actions)
    }

    pub fn merge(&mut self, other: ApplyReport) {
        self.submitted += other.submitted;
        self.failed_actions += other.failed_actions;
        self.failed_batches += other.failed_batches;
    }
}

/// Outcome of a remote creation batch, aligned with the submitted requests.
pub type CreatedItems = Vec<Result<Item, String>>;

/// Submits intents in batches of `batch_size`.
#[derive(Debug, Clone, Copy)]
pub struct MutationApplier {
    batch_size: usize,
}

impl MutationApplier {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Applies remote-side intents through queued transactions.
    ///
    /// # Errors
    /// - Returns the store error when a commit fails fatally.
    pub fn apply_remote<R: RemoteStore + ?Sized>(
        &self,
        remote: &mut R,
        intents: &[MutationIntent],
    ) -> Result<ApplyReport, StoreError> {
        let mut report = ApplyReport::default();
        for (batch_index, batch) in intents.chunks(self.batch_size).enumerate() {
            let mut queued = Vec::with_capacity(batch.len());
            for intent in batch {
                match intent {
                    MutationIntent::ReplaceItemTags { item_id, tags } => {
                        remote.set_tags(item_id, tags)
                    }
                    MutationIntent::SetFavorite { item_id, favorite } => {
                        remote.set_favorite(item_id, *favorite)
                    }
                    MutationIntent::SetArchived { item_id, archived } => {
                        remote.set_archived(item_id, *archived)
                    }
                    other => {
                        warn!(
                            "event=apply_action module=sync status=skip side=remote action={} reason=wrong_store",
                            other.name()
                        );
                        continue;
                    }
                }
                queued.push(intent);
            }
            if queued.is_empty() {
                continue;
            }

            report.submitted += queued.len();
            match remote.commit() {
                Ok(outcomes) => {
                    report.failed_actions += count_action_errors(
                        "remote",
                        batch_index,
                        &queued,
                        outcomes.iter().map(|o| o.as_ref().err()),
                    );
                    info!(
                        "event=apply_batch module=sync status=ok side=remote batch={} actions={}",
                        batch_index,
                        queued.len()
                    );
                }
                Err(err) if err.is_fatal() => {
                    error!(
                        "event=apply_batch module=sync status=error side=remote batch={} error_code={} error={}",
                        batch_index,
                        err.code(),
                        err
                    );
                    return Err(err);
                }
                Err(err) => {
                    report.failed_actions += queued.len();
                    report.failed_batches += 1;
                    warn!(
                        "event=apply_batch module=sync status=error side=remote batch={} actions={} error_code={} error={}",
                        batch_index,
                        queued.len(),
                        err.code(),
                        err
                    );
                }
            }
        }
        Ok(report)
    }

    /// Applies local-side intents through `multi` calls.
    ///
    /// # Errors
    /// - Returns the store error when a batch fails fatally.
    pub fn apply_local<L: LocalStore + ?Sized>(
        &self,
        local: &mut L,
        intents: &[MutationIntent],
    ) -> Result<ApplyReport, StoreError> {
        let mut report = ApplyReport::default();
        let mut skipped = 0;
        let intents: Vec<MutationIntent> = intents
            .iter()
            .filter(|intent| {
                let keep = intent.side() == StoreSide::Local;
                if !keep {
                    skipped += 1;
                }
                keep
            })
            .cloned()
            .collect();
        if skipped > 0 {
            warn!(
                "event=apply_action module=sync status=skip side=local count={} reason=wrong_store",
                skipped
            );
        }

        for (batch_index, batch) in intents.chunks(self.batch_size).enumerate() {
            report.submitted += batch.len();
            match local.multi(batch) {
                Ok(results) => {
                    let queued: Vec<&MutationIntent> = batch.iter().collect();
                    report.failed_actions += count_action_errors(
                        "local",
                        batch_index,
                        &queued,
                        results.iter().map(|r| r.as_ref().err()),
                    );
                    info!(
                        "event=apply_batch module=sync status=ok side=local batch={} actions={}",
                        batch_index,
                        batch.len()
                    );
                }
                Err(err) if err.is_fatal() => {
                    error!(
                        "event=apply_batch module=sync status=error side=local batch={} error_code={} error={}",
                        batch_index,
                        err.code(),
                        err
                    );
                    return Err(err);
                }
                Err(err) => {
                    report.failed_actions += batch.len();
                    report.failed_batches += 1;
                    warn!(
                        "event=apply_batch module=sync status=error side=local batch={} actions={} error_code={} error={}",
                        batch_index,
                        batch.len(),
                        err.code(),
                        err
                    );
                }
            }
        }
        Ok(report)
    }

    /// Creates remote items in batches, returning one result per request.
    ///
    /// A non-fatal commit failure marks every request of that batch failed.
    ///
    /// # Errors
    /// - Returns the store error when a commit fails fatally.
    pub fn create_items<R: RemoteStore + ?Sized>(
        &self,
        remote: &mut R,
        requests: &[ItemRequest],
    ) -> Result<CreatedItems, StoreError> {
        let mut created = Vec::with_capacity(requests.len());
        for (batch_index, batch) in requests.chunks(self.batch_size).enumerate() {
            for request in batch {
                remote.create_item(&request.url, &request.title, &request.tags);
            }
            match remote.commit() {
                Ok(outcomes) => {
                    let mut outcomes = outcomes.into_iter();
                    for _ in batch {
                        let result = match outcomes.next() {
                            Some(Ok(Some(item))) => Ok(item),
                            Some(Ok(None)) => Err("no item returned".to_string()),
                            Some(Err(message)) => Err(message),
                            None => Err("missing action result".to_string()),
                        };
                        created.push(result);
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(
                        "event=create_items module=sync status=error batch={} actions={} error_code={} error={}",
                        batch_index,
                        batch.len(),
                        err.code(),
                        err
                    );
                    created.extend(batch.iter().map(|_| Err(err.to_string())));
                }
            }
        }
        Ok(created)
    }
}

fn count_action_errors<'a>(
    side: &str,
    batch_index: usize,
    queued: &[&MutationIntent],
    errors: impl Iterator<Item = Option<&'a String>>,
) -> usize {
    let mut errors = errors.fuse();
    let mut failed = 0;
    for intent in queued {
        match errors.next() {
            Some(None) => {}
            Some(Some(message)) => {
                failed += 1;
                warn!(
                    "event=apply_action module=sync status=error side={} batch={} action={} error={}",
                    side,
                    batch_index,
                    intent.name(),
                    message
                );
            }
            None => {
                failed += 1;
                warn!(
                    "event=apply_action module=sync status=error side={} batch={} action={} error=missing_result",
                    side,
                    batch_index,
                    intent.name()
                );
            }
        }
    }
    failed
}
