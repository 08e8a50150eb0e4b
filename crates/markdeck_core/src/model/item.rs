//! Bookmark item model.
//!
//! # Responsibility
//! - Represent one entry of the remote bookmark list.
//! - Decode the export wire format (string flags, numeric strings, tag and
//!   author maps) into typed values.
//! - Project an item onto the flashcard note field set.
//!
//! # Invariants
//! - `favorite` and `status` are never compared as strings past decoding.
//! - Unparseable timestamps decode as `0` ("unknown, oldest possible").

use crate::model::note::{
    FIELD_AUTHORS, FIELD_EXCERPT, FIELD_GIVEN_TITLE, FIELD_GIVEN_URL, FIELD_ITEM_ID,
    FIELD_RESOLVED_TITLE, FIELD_RESOLVED_URL, FIELD_TIME_ADDED, FIELD_TIME_TO_READ,
    FIELD_WORD_COUNT,
};
use crate::model::tags::TagSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Remote item identifier, kept in its textual wire form.
pub type ItemId = String;

/// Read state of a bookmark item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemStatus {
    #[default]
    Unread,
    Archived,
}

impl ItemStatus {
    fn from_wire(value: &str) -> Self {
        // Anything but "0" is out of the unread list ("1" archived, "2" deleted).
        match value.trim() {
            "0" | "" => Self::Unread,
            _ => Self::Archived,
        }
    }

    fn as_wire(self) -> &'static str {
        match self {
            Self::Unread => "0",
            Self::Archived => "1",
        }
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = wire::NumberOrText::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw.into_text()))
    }
}

/// One bookmark list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(with = "wire::id")]
    pub item_id: ItemId,
    #[serde(default)]
    pub given_url: String,
    #[serde(default)]
    pub given_title: String,
    #[serde(default)]
    pub resolved_url: String,
    #[serde(default)]
    pub resolved_title: String,
    /// Unix seconds.
    #[serde(default, with = "wire::epoch")]
    pub time_added: i64,
    /// Unix seconds of the last remote edit (tags included).
    #[serde(default, with = "wire::epoch")]
    pub time_updated: i64,
    /// Unix seconds of the last favorite flag change.
    #[serde(default, with = "wire::epoch")]
    pub time_favorited: i64,
    #[serde(default, with = "wire::epoch")]
    pub time_read: i64,
    #[serde(default, with = "wire::count", skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(default, with = "wire::count", skip_serializing_if = "Option::is_none")]
    pub time_to_read: Option<u64>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default, with = "wire::authors")]
    pub authors: BTreeSet<String>,
    #[serde(default, with = "wire::tags")]
    pub tags: TagSet,
    #[serde(default, with = "wire::flag")]
    pub favorite: bool,
    #[serde(default)]
    pub status: ItemStatus,
}

impl Item {
    /// Creates an unread, untagged item with only identity fields set.
    pub fn new(item_id: impl Into<ItemId>, given_url: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            given_url: given_url.into(),
            given_title: String::new(),
            resolved_url: String::new(),
            resolved_title: String::new(),
            time_added: 0,
            time_updated: 0,
            time_favorited: 0,
            time_read: 0,
            word_count: None,
            time_to_read: None,
            excerpt: String::new(),
            authors: BTreeSet::new(),
            tags: TagSet::new(),
            favorite: false,
            status: ItemStatus::Unread,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.status == ItemStatus::Unread
    }

    /// Projects this item onto the note field set it owns.
    ///
    /// Authors are joined in sorted order; numeric values are rendered as text
    /// and absent counts as empty strings.
    pub fn note_fields(&self) -> BTreeMap<String, String> {
        let authors = self
            .authors
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let count = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();

        [
            (FIELD_ITEM_ID, self.item_id.clone()),
            (FIELD_GIVEN_URL, self.given_url.clone()),
            (FIELD_GIVEN_TITLE, self.given_title.clone()),
            (FIELD_RESOLVED_URL, self.resolved_url.clone()),
            (FIELD_RESOLVED_TITLE, self.resolved_title.clone()),
            (FIELD_TIME_ADDED, self.time_added.to_string()),
            (FIELD_WORD_COUNT, count(self.word_count)),
            (FIELD_TIME_TO_READ, count(self.time_to_read)),
            (FIELD_EXCERPT, self.excerpt.clone()),
            (FIELD_AUTHORS, authors),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

/// Serde adapters for the bookmark export format.
pub(crate) mod wire {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(crate) enum NumberOrText {
        Number(i64),
        Text(String),
    }

    impl NumberOrText {
        pub(crate) fn into_text(self) -> String {
            match self {
                Self::Number(value) => value.to_string(),
                Self::Text(value) => value,
            }
        }

        fn to_i64(&self) -> Option<i64> {
            match self {
                Self::Number(value) => Some(*value),
                Self::Text(value) => value.trim().parse().ok(),
            }
        }
    }

    pub mod id {
        use super::*;

        pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(value)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
            let value = NumberOrText::deserialize(deserializer)?.into_text();
            if value.trim().is_empty() {
                return Err(serde::de::Error::custom("item_id cannot be empty"));
            }
            Ok(value.trim().to_string())
        }
    }

    pub mod epoch {
        use super::*;

        pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&value.to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
            let raw = Option::<NumberOrText>::deserialize(deserializer)?;
            Ok(raw.and_then(|value| value.to_i64()).unwrap_or(0))
        }
    }

    pub mod count {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<u64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&value.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<u64>, D::Error> {
            let raw = Option::<NumberOrText>::deserialize(deserializer)?;
            Ok(raw
                .and_then(|value| value.to_i64())
                .and_then(|value| u64::try_from(value).ok()))
        }
    }

    pub mod flag {
        use super::*;

        pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(if *value { "1" } else { "0" })
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
            let raw = Option::<NumberOrText>::deserialize(deserializer)?;
            Ok(matches!(raw.and_then(|value| value.to_i64()), Some(1)))
        }
    }

    /// Either a map keyed by id/name (export format) or a plain list (the
    /// add API answers `[]` when empty).
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(BTreeMap<String, serde_json::Value>),
        List(Vec<serde_json::Value>),
    }

    fn entry_name(key: Option<&str>, value: &serde_json::Value, field: &str) -> Option<String> {
        let name = match value {
            serde_json::Value::String(name) => Some(name.clone()),
            serde_json::Value::Object(object) => object
                .get(field)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            _ => None,
        }
        .or_else(|| key.map(str::to_string))?;
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn names<'de, D: Deserializer<'de>>(
        deserializer: D,
        field: &str,
        key_is_name: bool,
    ) -> Result<BTreeSet<String>, D::Error> {
        let raw = Option::<MapOrList>::deserialize(deserializer)?;
        let names = match raw {
            None => BTreeSet::new(),
            Some(MapOrList::Map(map)) => map
                .iter()
                .filter_map(|(key, value)| {
                    let fallback = key_is_name.then_some(key.as_str());
                    entry_name(fallback, value, field)
                })
                .collect(),
            Some(MapOrList::List(list)) => list
                .iter()
                .filter_map(|value| entry_name(None, value, field))
                .collect(),
        };
        Ok(names)
    }

    fn serialize_named<S: Serializer>(
        names: &BTreeSet<String>,
        field: &str,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(names.len()))?;
        for name in names {
            let mut entry = serde_json::Map::new();
            entry.insert(field.to_string(), serde_json::Value::String(name.clone()));
            map.serialize_entry(name, &entry)?;
        }
        map.end()
    }

    pub mod tags {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &BTreeSet<String>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serialize_named(value, "tag", serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<BTreeSet<String>, D::Error> {
            names(deserializer, "tag", true)
        }
    }

    pub mod authors {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &BTreeSet<String>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serialize_named(value, "name", serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<BTreeSet<String>, D::Error> {
            names(deserializer, "name", false)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::{Item, ItemStatus};
    use crate::model::tags::tag_set;
    use serde_json::json;

    #[test]
    fn decodes_export_entry_with_string_flags() {
        let item: Item = serde_json::from_value(json!({
            "item_id": "229279689",
            "given_url": "http://example.com/a",
            "given_title": "A",
            "favorite": "1",
            "status": "0",
            "time_added": "1700000000",
            "time_updated": "1700000100",
            "time_favorited": "0",
            "word_count": "1200",
            "tags": {
                "rust": {"item_id": "229279689", "tag": "rust"},
                "news": {"item_id": "229279689", "tag": "news"}
            },
            "authors": {
                "7": {"author_id": "7", "name": "Zed"},
                "3": {"author_id": "3", "name": "Amy"}
            }
        }))
        .unwrap();

        assert!(item.favorite);
        assert_eq!(item.status, ItemStatus::Unread);
        assert_eq!(item.time_updated, 1_700_000_100);
        assert_eq!(item.word_count, Some(1200));
        assert_eq!(item.tags, tag_set(["news", "rust"]));
        assert_eq!(item.note_fields()["authors"], "Amy, Zed");
    }

    #[test]
    fn tolerates_empty_list_authors_and_missing_optionals() {
        let item: Item = serde_json::from_value(json!({
            "item_id": 42,
            "authors": [],
            "status": "2",
            "time_updated": "garbage"
        }))
        .unwrap();

        assert_eq!(item.item_id, "42");
        assert!(item.authors.is_empty());
        assert!(item.tags.is_empty());
        assert_eq!(item.status, ItemStatus::Archived);
        assert_eq!(item.time_updated, 0);
        assert!(!item.favorite);
    }

    #[test]
    fn encodes_flags_back_to_wire_strings() {
        let mut item = Item::new("9", "http://example.com");
        item.favorite = true;
        item.status = ItemStatus::Archived;
        item.tags = tag_set(["misc"]);

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["favorite"], "1");
        assert_eq!(value["status"], "1");
        assert_eq!(value["tags"]["misc"]["tag"], "misc");
        assert!(value.get("word_count").is_none());

        let decoded: Item = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, item);
    }
}
