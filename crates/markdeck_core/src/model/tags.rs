//! Tag sets and reserved control markers.

use std::collections::BTreeSet;

/// Ordered, deduplicated tag collection.
pub type TagSet = BTreeSet<String>;

/// Note tag mirroring the item favorite flag.
pub const FAVORITE_MARKER: &str = "marked";
/// Tag mirroring "at least one card of this note is suspended".
pub const SUSPENDED_MARKER: &str = "anki:suspend";

/// Returns whether `tag` is a reserved control marker.
pub fn is_control_marker(tag: &str) -> bool {
    tag == FAVORITE_MARKER || tag == SUSPENDED_MARKER
}

/// Returns the domain view of a tag set, with control markers removed.
pub fn strip_markers(tags: &TagSet) -> TagSet {
    tags.iter()
        .filter(|tag| !is_control_marker(tag))
        .cloned()
        .collect()
}

/// Builds a tag set from string slices.
pub fn tag_set<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::{strip_markers, tag_set, FAVORITE_MARKER, SUSPENDED_MARKER};

    #[test]
    fn strip_markers_keeps_domain_tags_only() {
        let tags = tag_set(["news", FAVORITE_MARKER, SUSPENDED_MARKER, "rust"]);
        assert_eq!(strip_markers(&tags), tag_set(["news", "rust"]));
    }
}
