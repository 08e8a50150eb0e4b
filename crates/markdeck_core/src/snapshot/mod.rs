//! Bookmark export snapshots.
//!
//! # Responsibility
//! - Load and save `{"list": {"<item_id>": {...}}}` export files.
//! - Compute the incremental working set between two snapshots.
//!
//! # Invariants
//! - Unknown top-level keys survive a load/save cycle.
//! - An empty export may carry `"list": []`; it loads as an empty map.

pub mod remote;

use crate::model::item::{Item, ItemId};
use log::{error, info};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub use remote::SnapshotRemoteStore;

/// Snapshot load/save failure.
#[derive(Debug)]
pub enum SnapshotError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    /// Top-level object without a `list` key.
    MissingList,
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Json(err) => write!(f, "invalid snapshot json: {err}"),
            Self::MissingList => write!(f, "snapshot has no `list` object"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::MissingList => None,
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Point-in-time copy of the bookmark list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(deserialize_with = "item_list")]
    pub list: BTreeMap<ItemId, Item>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Snapshot {
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        Self {
            list: items
                .into_iter()
                .map(|item| (item.item_id.clone(), item))
                .collect(),
            extra: Map::new(),
        }
    }

    /// Parses an export document.
    ///
    /// # Errors
    /// - `MissingList` when the document has no `list` key.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(text)?;
        if value.get("list").is_none() {
            return Err(SnapshotError::MissingList);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Reads a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            error!(
                "event=snapshot_load module=snapshot status=error path={} error_code=io error={}",
                path.display(),
                source
            );
            SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let snapshot = Self::from_json(&text)?;
        info!(
            "event=snapshot_load module=snapshot status=ok path={} items={}",
            path.display(),
            snapshot.list.len()
        );
        Ok(snapshot)
    }

    /// Writes the snapshot as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "event=snapshot_save module=snapshot status=ok path={} items={}",
            path.display(),
            self.list.len()
        );
        Ok(())
    }

    pub fn ids(&self) -> BTreeSet<ItemId> {
        self.list.keys().cloned().collect()
    }

    /// Ids present here but not in `previous`.
    pub fn new_ids_since(&self, previous: &Snapshot) -> BTreeSet<ItemId> {
        self.list
            .keys()
            .filter(|id| !previous.list.contains_key(*id))
            .cloned()
            .collect()
    }
}

fn item_list<'de, D>(deserializer: D) -> Result<BTreeMap<ItemId, Item>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ItemList {
        Map(BTreeMap<String, Item>),
        List(Vec<Item>),
    }

    let items: Vec<Item> = match ItemList::deserialize(deserializer)? {
        ItemList::Map(map) => map.into_values().collect(),
        ItemList::List(list) => list,
    };
    Ok(items
        .into_iter()
        .map(|item| (item.item_id.clone(), item))
        .collect())
}
