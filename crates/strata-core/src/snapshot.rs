//! Diffable list snapshots.
//!
//! A [`DiffableSnapshot`] is an ordered, section-partitioned list of item
//! identities mutated through a fixed vocabulary of operations, at both
//! section and item granularity, for incremental presentation of fetch
//! results. Snapshots are value types: clone, mutate, diff against the
//! previous clone.
//!
//! Identity-based operations treat a missing identity as a programming
//! error and panic; check [`DiffableSnapshot::index_of_section`] or
//! [`DiffableSnapshot::index_of_item`] first when absence is expected.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Stable opaque identity of one item (a record id).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub [u8; 16]);

impl From<[u8; 16]> for ItemId {
    fn from(bytes: [u8; 16]) -> Self {
        ItemId(bytes)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", hex::encode(self.0))
    }
}

/// One item entry.
///
/// `is_reloaded` participates in equality: a reloaded item never compares
/// content-equal to its pre-reload self, which is what forces diffing to
/// re-render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotItem {
    /// The item identity.
    pub id: ItemId,
    /// Whether the item was marked reloaded.
    pub is_reloaded: bool,
}

impl SnapshotItem {
    fn new(id: ItemId) -> Self {
        Self {
            id,
            is_reloaded: false,
        }
    }
}

/// One section: a stable string identity owning an ordered run of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSection {
    /// The section identity.
    pub id: String,
    /// Ordered items.
    items: Vec<SnapshotItem>,
    /// Whether the section was marked reloaded.
    pub is_reloaded: bool,
    /// Optional index title for section-index UIs.
    pub index_title: Option<String>,
}

impl SnapshotSection {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
            is_reloaded: false,
            index_title: None,
        }
    }

    /// The items of this section, in order.
    pub fn items(&self) -> &[SnapshotItem] {
        &self.items
    }

    /// Number of items in this section.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the section holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An ordered, section-partitioned list of item identities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffableSnapshot {
    sections: Vec<SnapshotSection>,
    /// Every identity ever marked reloaded since this snapshot was created,
    /// for external change tracking.
    reloaded_ids: BTreeSet<ItemId>,
}

impl DiffableSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from raw `(section id, item ids)` results.
    ///
    /// With a window, items before `offset` (counted across the whole
    /// result set) are skipped entirely, and once `limit` items have been
    /// taken the remaining sections and items are dropped. Sections left
    /// without items do not appear in the snapshot.
    pub fn from_sections<I, S>(sections: I, offset: usize, limit: Option<usize>) -> Self
    where
        I: IntoIterator<Item = (S, Vec<ItemId>)>,
        S: Into<String>,
    {
        let mut snapshot = Self::new();
        let mut position = 0usize;
        let mut taken = 0usize;

        for (section_id, items) in sections {
            if limit.is_some_and(|l| taken >= l) {
                break;
            }
            let mut section = SnapshotSection::new(section_id);
            for id in items {
                let within = position >= offset && limit.is_none_or(|l| taken < l);
                if within {
                    section.items.push(SnapshotItem::new(id));
                    taken += 1;
                }
                position += 1;
            }
            if !section.items.is_empty() {
                snapshot.sections.push(section);
            }
        }
        snapshot
    }

    // ===== Lookup =====

    /// Number of sections.
    pub fn number_of_sections(&self) -> usize {
        self.sections.len()
    }

    /// Total number of items across all sections.
    pub fn number_of_items(&self) -> usize {
        self.sections.iter().map(SnapshotSection::len).sum()
    }

    /// Check if the snapshot holds no items.
    pub fn is_empty(&self) -> bool {
        self.number_of_items() == 0
    }

    /// Section identities, in order.
    pub fn section_ids(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.id.as_str()).collect()
    }

    /// The sections themselves, in order.
    pub fn sections(&self) -> &[SnapshotSection] {
        &self.sections
    }

    /// Position of a section by identity.
    pub fn index_of_section(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == section_id)
    }

    /// Check whether a section identity exists.
    pub fn has_section(&self, section_id: &str) -> bool {
        self.index_of_section(section_id).is_some()
    }

    /// Every item identity, flattened across sections in order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter().map(|i| i.id))
            .collect()
    }

    /// The item identities of one section, in order.
    ///
    /// # Panics
    ///
    /// Panics if the section identity does not exist; check
    /// [`index_of_section`](Self::index_of_section) first when absence is
    /// expected.
    pub fn items_in_section(&self, section_id: &str) -> Vec<ItemId> {
        let index = self
            .index_of_section(section_id)
            .unwrap_or_else(|| panic!("section {section_id:?} does not exist in this snapshot"));
        self.sections[index].items.iter().map(|i| i.id).collect()
    }

    /// Position of an item as `(section index, item index)`.
    pub fn index_of_item(&self, id: ItemId) -> Option<(usize, usize)> {
        for (section_index, section) in self.sections.iter().enumerate() {
            if let Some(item_index) = section.items.iter().position(|i| i.id == id) {
                return Some((section_index, item_index));
            }
        }
        None
    }

    /// Check whether an item identity exists anywhere in the snapshot.
    pub fn contains_item(&self, id: ItemId) -> bool {
        self.index_of_item(id).is_some()
    }

    /// Every identity marked reloaded since this snapshot was created.
    pub fn reloaded_item_ids(&self) -> &BTreeSet<ItemId> {
        &self.reloaded_ids
    }

    // ===== Section mutation =====

    /// Append sections at the end.
    ///
    /// # Panics
    ///
    /// Panics if a section identity already exists.
    pub fn append_sections<I, S>(&mut self, section_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let at = self.sections.len();
        self.insert_sections_impl(section_ids, at);
    }

    /// Insert sections before an existing one.
    ///
    /// # Panics
    ///
    /// Panics if the anchor does not exist or a new identity already
    /// exists.
    pub fn insert_sections_before<I, S>(&mut self, section_ids: I, anchor: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let at = self.require_section(anchor);
        self.insert_sections_impl(section_ids, at);
    }

    /// Insert sections after an existing one.
    ///
    /// # Panics
    ///
    /// Panics if the anchor does not exist or a new identity already
    /// exists.
    pub fn insert_sections_after<I, S>(&mut self, section_ids: I, anchor: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let at = self.require_section(anchor) + 1;
        self.insert_sections_impl(section_ids, at);
    }

    /// Delete the named sections and everything they hold. Unknown
    /// identities are ignored.
    pub fn delete_sections(&mut self, section_ids: &[&str]) {
        self.sections.retain(|s| !section_ids.contains(&s.id.as_str()));
    }

    /// Move a section immediately before another.
    ///
    /// # Panics
    ///
    /// Panics if either identity does not exist.
    pub fn move_section_before(&mut self, section_id: &str, anchor: &str) {
        let from = self.require_section(section_id);
        let section = self.sections.remove(from);
        let to = self.require_section(anchor);
        self.sections.insert(to, section);
    }

    /// Move a section immediately after another.
    ///
    /// # Panics
    ///
    /// Panics if either identity does not exist.
    pub fn move_section_after(&mut self, section_id: &str, anchor: &str) {
        let from = self.require_section(section_id);
        let section = self.sections.remove(from);
        let to = self.require_section(anchor) + 1;
        self.sections.insert(to, section);
    }

    /// Mark the named sections reloaded. Unknown identities are ignored.
    pub fn reload_sections(&mut self, section_ids: &[&str]) {
        for section in &mut self.sections {
            if section_ids.contains(&section.id.as_str()) {
                section.is_reloaded = true;
            }
        }
    }

    /// Set the index title of a section.
    ///
    /// # Panics
    ///
    /// Panics if the section identity does not exist.
    pub fn set_section_index_title(&mut self, section_id: &str, title: Option<String>) {
        let index = self.require_section(section_id);
        self.sections[index].index_title = title;
    }

    // ===== Item mutation =====

    /// Append items to a section, or to the last section when `None`.
    ///
    /// # Panics
    ///
    /// Panics if the section does not exist, the snapshot has no sections,
    /// or an identity is already present.
    pub fn append_items<I>(&mut self, item_ids: I, section_id: Option<&str>)
    where
        I: IntoIterator<Item = ItemId>,
    {
        let section_index = match section_id {
            Some(id) => self.require_section(id),
            None => {
                assert!(
                    !self.sections.is_empty(),
                    "cannot append items to a snapshot with no sections"
                );
                self.sections.len() - 1
            }
        };
        let item_index = self.sections[section_index].items.len();
        self.insert_items_impl(item_ids, section_index, item_index);
    }

    /// Insert items immediately before an existing item.
    ///
    /// # Panics
    ///
    /// Panics if the anchor does not exist or an identity is already
    /// present.
    pub fn insert_items_before<I>(&mut self, item_ids: I, anchor: ItemId)
    where
        I: IntoIterator<Item = ItemId>,
    {
        let (section_index, item_index) = self.require_item(anchor);
        self.insert_items_impl(item_ids, section_index, item_index);
    }

    /// Insert items immediately after an existing item.
    ///
    /// # Panics
    ///
    /// Panics if the anchor does not exist or an identity is already
    /// present.
    pub fn insert_items_after<I>(&mut self, item_ids: I, anchor: ItemId)
    where
        I: IntoIterator<Item = ItemId>,
    {
        let (section_index, item_index) = self.require_item(anchor);
        self.insert_items_impl(item_ids, section_index, item_index + 1);
    }

    /// Delete the given items wherever they live. Unknown identities are
    /// ignored.
    ///
    /// Removal is batched per section through reverse-sorted index lists so
    /// earlier removals never invalidate later indices.
    pub fn delete_items(&mut self, item_ids: &[ItemId]) {
        let mut per_section: HashMap<usize, Vec<usize>> = HashMap::new();
        for id in item_ids {
            if let Some((section_index, item_index)) = self.index_of_item(*id) {
                per_section.entry(section_index).or_default().push(item_index);
            }
        }
        for (section_index, mut indices) in per_section {
            indices.sort_unstable_by(|a, b| b.cmp(a));
            indices.dedup();
            let items = &mut self.sections[section_index].items;
            for index in indices {
                items.remove(index);
            }
        }
    }

    /// Move an item immediately before another, across sections if needed.
    ///
    /// # Panics
    ///
    /// Panics if either identity does not exist, or both are the same.
    pub fn move_item_before(&mut self, id: ItemId, anchor: ItemId) {
        assert!(id != anchor, "cannot move an item relative to itself");
        let (from_section, from_index) = self.require_item(id);
        let item = self.sections[from_section].items.remove(from_index);
        let (to_section, to_index) = self.require_item(anchor);
        self.sections[to_section].items.insert(to_index, item);
    }

    /// Move an item immediately after another, across sections if needed.
    ///
    /// # Panics
    ///
    /// Panics if either identity does not exist, or both are the same.
    pub fn move_item_after(&mut self, id: ItemId, anchor: ItemId) {
        assert!(id != anchor, "cannot move an item relative to itself");
        let (from_section, from_index) = self.require_item(id);
        let item = self.sections[from_section].items.remove(from_index);
        let (to_section, to_index) = self.require_item(anchor);
        self.sections[to_section].items.insert(to_index + 1, item);
    }

    /// Mark the given items reloaded and record their identities in the
    /// running reloaded set. Unknown identities are ignored.
    pub fn update_items(&mut self, item_ids: &[ItemId]) {
        for id in item_ids {
            if let Some((section_index, item_index)) = self.index_of_item(*id) {
                self.sections[section_index].items[item_index].is_reloaded = true;
                self.reloaded_ids.insert(*id);
            }
        }
    }

    // ===== Positional variants =====
    //
    // These operate on raw indices instead of identities. Callers are
    // responsible for index validity; out-of-range indices panic.

    /// Insert an empty section at a raw position.
    pub fn insert_section_at(&mut self, index: usize, section_id: impl Into<String>) {
        let section_id = section_id.into();
        assert!(
            !self.has_section(&section_id),
            "section {section_id:?} already exists in this snapshot"
        );
        self.sections.insert(index, SnapshotSection::new(section_id));
    }

    /// Remove the section at a raw position, returning it.
    pub fn remove_section_at(&mut self, index: usize) -> SnapshotSection {
        self.sections.remove(index)
    }

    /// Insert an item at a raw `(section, item)` position.
    pub fn insert_item_at(&mut self, section_index: usize, item_index: usize, id: ItemId) {
        assert!(
            !self.contains_item(id),
            "item {id:?} already exists in this snapshot"
        );
        self.sections[section_index]
            .items
            .insert(item_index, SnapshotItem::new(id));
    }

    /// Remove the item at a raw `(section, item)` position, returning its
    /// identity.
    pub fn remove_item_at(&mut self, section_index: usize, item_index: usize) -> ItemId {
        self.sections[section_index].items.remove(item_index).id
    }

    // ===== Internals =====

    fn require_section(&self, section_id: &str) -> usize {
        self.index_of_section(section_id)
            .unwrap_or_else(|| panic!("section {section_id:?} does not exist in this snapshot"))
    }

    fn require_item(&self, id: ItemId) -> (usize, usize) {
        self.index_of_item(id)
            .unwrap_or_else(|| panic!("item {id:?} does not exist in this snapshot"))
    }

    fn insert_sections_impl<I, S>(&mut self, section_ids: I, at: usize)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut at = at;
        for section_id in section_ids {
            let section_id = section_id.into();
            assert!(
                !self.has_section(&section_id),
                "section {section_id:?} already exists in this snapshot"
            );
            self.sections.insert(at, SnapshotSection::new(section_id));
            at += 1;
        }
    }

    fn insert_items_impl<I>(&mut self, item_ids: I, section_index: usize, item_index: usize)
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut at = item_index;
        for id in item_ids {
            assert!(
                !self.contains_item(id),
                "item {id:?} already exists in this snapshot"
            );
            self.sections[section_index]
                .items
                .insert(at, SnapshotItem::new(id));
            at += 1;
        }
    }
}
