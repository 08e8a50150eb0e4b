//! Bookmark list backed by an in-memory snapshot.
//!
//! Queued actions are applied on `commit()` in queue order, stamping the
//! remote edit times the way the live service does. Actions that change
//! nothing leave the timestamps alone.

use crate::model::item::{Item, ItemStatus};
use crate::model::tags::TagSet;
use crate::snapshot::Snapshot;
use crate::sync::clock::{Clock, SystemClock};
use crate::sync::store::{ActionOutcome, RemoteStore, StoreResult};
use log::info;

#[derive(Debug, Clone)]
enum QueuedAction {
    Create {
        url: String,
        title: String,
        tags: TagSet,
    },
    SetTags {
        item_id: String,
        tags: TagSet,
    },
    SetFavorite {
        item_id: String,
        favorite: bool,
    },
    SetArchived {
        item_id: String,
        archived: bool,
    },
}

pub struct SnapshotRemoteStore {
    snapshot: Snapshot,
    queue: Vec<QueuedAction>,
    clock: Box<dyn Clock>,
}

impl SnapshotRemoteStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            queue: Vec::new(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Mutable access for edits made outside a sync run.
    pub fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    /// Final list state; uncommitted actions are dropped.
    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn next_item_id(&self) -> String {
        let max = self
            .snapshot
            .list
            .keys()
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }

    fn apply(&mut self, action: QueuedAction, now: i64) -> ActionOutcome {
        match action {
            QueuedAction::Create { url, title, tags } => {
                if url.trim().is_empty() {
                    return Err("invalid url".to_string());
                }
                let mut item = Item::new(self.next_item_id(), url);
                item.given_title = title;
                item.tags = tags;
                item.time_added = now;
                item.time_updated = now;
                self.snapshot
                    .list
                    .insert(item.item_id.clone(), item.clone());
                Ok(Some(item))
            }
            QueuedAction::SetTags { item_id, tags } => {
                let item = self.item_mut(&item_id)?;
                if item.tags != tags {
                    item.tags = tags;
                    item.time_updated = now;
                }
                Ok(None)
            }
            QueuedAction::SetFavorite { item_id, favorite } => {
                let item = self.item_mut(&item_id)?;
                if item.favorite != favorite {
                    item.favorite = favorite;
                    item.time_favorited = now;
                    item.time_updated = now;
                }
                Ok(None)
            }
            QueuedAction::SetArchived { item_id, archived } => {
                let item = self.item_mut(&item_id)?;
                let status = if archived {
                    ItemStatus::Archived
                } else {
                    ItemStatus::Unread
                };
                if item.status != status {
                    item.status = status;
                    item.time_read = if archived { now } else { 0 };
                    item.time_updated = now;
                }
                Ok(None)
            }
        }
    }

    fn item_mut(&mut self, item_id: &str) -> Result<&mut Item, String> {
        self.snapshot
            .list
            .get_mut(item_id)
            .ok_or_else(|| format!("item {item_id} not found"))
    }
}

impl RemoteStore for SnapshotRemoteStore {
    fn list_items(&self) -> StoreResult<Vec<Item>> {
        Ok(self.snapshot.list.values().cloned().collect())
    }

    fn create_item(&mut self, url: &str, title: &str, tags: &TagSet) {
        self.queue.push(QueuedAction::Create {
            url: url.to_string(),
            title: title.to_string(),
            tags: tags.clone(),
        });
    }

    fn set_tags(&mut self, item_id: &str, tags: &TagSet) {
        self.queue.push(QueuedAction::SetTags {
            item_id: item_id.to_string(),
            tags: tags.clone(),
        });
    }

    fn set_favorite(&mut self, item_id: &str, favorite: bool) {
        self.queue.push(QueuedAction::SetFavorite {
            item_id: item_id.to_string(),
            favorite,
        });
    }

    fn set_archived(&mut self, item_id: &str, archived: bool) {
        self.queue.push(QueuedAction::SetArchived {
            item_id: item_id.to_string(),
            archived,
        });
    }

    fn commit(&mut self) -> StoreResult<Vec<ActionOutcome>> {
        let now = self.clock.now_secs();
        let queue = std::mem::take(&mut self.queue);
        let count = queue.len();
        let outcomes: Vec<ActionOutcome> = queue
            .into_iter()
            .map(|action| self.apply(action, now))
            .collect();
        info!(
            "event=remote_commit module=snapshot status=ok actions={} failed={}",
            count,
            outcomes.iter().filter(|outcome| outcome.is_err()).count()
        );
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::SnapshotRemoteStore;
    use crate::model::item::{Item, ItemStatus};
    use crate::model::tags::{tag_set, TagSet};
    use crate::snapshot::Snapshot;
    use crate::sync::clock::ManualClock;
    use crate::sync::store::RemoteStore;

    fn store() -> SnapshotRemoteStore {
        let mut item = Item::new("41", "http://a");
        item.time_updated = 10;
        SnapshotRemoteStore::new(Snapshot::from_items([item])).with_clock(ManualClock::new(500))
    }

    #[test]
    fn commit_applies_queue_in_order_and_stamps_changes() {
        let mut remote = store();
        remote.set_tags("41", &tag_set(["news"]));
        remote.set_favorite("41", true);
        remote.set_archived("missing", true);
        assert_eq!(remote.pending(), 3);

        let outcomes = remote.commit().unwrap();
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
        assert!(outcomes[2].is_err());
        assert_eq!(remote.pending(), 0);

        let item = &remote.snapshot().list["41"];
        assert_eq!(item.tags, tag_set(["news"]));
        assert!(item.favorite);
        assert_eq!(item.time_favorited, 500);
        assert_eq!(item.time_updated, 500);
    }

    #[test]
    fn no_op_actions_keep_timestamps() {
        let mut remote = store();
        remote.set_archived("41", false);
        remote.set_tags("41", &TagSet::new());
        remote.commit().unwrap();
        let item = &remote.snapshot().list["41"];
        assert_eq!(item.time_updated, 10);
        assert_eq!(item.status, ItemStatus::Unread);
    }

    #[test]
    fn created_items_get_the_next_numeric_id() {
        let mut remote = store();
        remote.create_item("http://b", "B", &tag_set(["x"]));
        remote.create_item("", "empty", &tag_set(["x"]));
        let outcomes = remote.commit().unwrap();

        let created = outcomes[0].clone().unwrap().unwrap();
        assert_eq!(created.item_id, "42");
        assert_eq!(created.given_title, "B");
        assert_eq!(created.time_added, 500);
        assert!(outcomes[1].is_err());
        assert_eq!(remote.list_items().unwrap().len(), 2);
    }
}
