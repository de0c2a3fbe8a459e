use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::geometry::Extent;
use crate::id::{ItemId, ItemKey, ZoneId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::HashMap;

/// Metadata the engine carries through untouched, except for `expiry_date`
/// which breaks priority ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    /// ISO-8601 date (`YYYY-MM-DD`); compared lexicographically.
    pub expiry_date: Option<String>,
    pub usage_limit: Option<u32>,
    pub mass: Option<f64>,
}

/// An item submitted for placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub extent: Extent,
    /// Precomputed by the priority engine. Higher is placed first.
    pub priority: Fixed64,
    pub preferred_zone: ZoneId,
    #[serde(default)]
    pub meta: ItemMeta,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, extent: Extent) -> Self {
        Self {
            id: ItemId::new(id),
            name: name.into(),
            extent,
            priority: Fixed64::ZERO,
            preferred_zone: ZoneId::new(""),
            meta: ItemMeta::default(),
        }
    }

    pub fn with_priority(mut self, score: f64) -> Self {
        self.priority = f64_to_fixed64(score);
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.preferred_zone = ZoneId::new(zone);
        self
    }

    pub fn with_expiry(mut self, date: impl Into<String>) -> Self {
        self.meta.expiry_date = Some(date.into());
        self
    }

    pub fn volume(&self) -> u64 {
        self.extent.volume()
    }
}

/// All items known to one engine, addressed by arena key and looked up by id.
///
/// Insertion order is preserved so that every query that walks the table is
/// deterministic.
#[derive(Debug, Default)]
pub struct ItemTable {
    items: SlotMap<ItemKey, Item>,
    by_id: HashMap<ItemId, ItemKey>,
    order: Vec<ItemKey>,
}

impl ItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item. An id seen before keeps its original definition and
    /// key.
    pub fn insert(&mut self, item: Item) -> ItemKey {
        if let Some(&key) = self.by_id.get(&item.id) {
            return key;
        }
        let id = item.id.clone();
        let key = self.items.insert(item);
        self.by_id.insert(id, key);
        self.order.push(key);
        key
    }

    pub fn get(&self, key: ItemKey) -> Option<&Item> {
        self.items.get(key)
    }

    pub fn key_of(&self, id: &ItemId) -> Option<ItemKey> {
        self.by_id.get(id).copied()
    }

    /// The external id of a key. Keys handed out by this table always resolve.
    pub fn id_of(&self, key: ItemKey) -> Option<&ItemId> {
        self.items.get(key).map(|item| &item.id)
    }

    /// Items in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemKey, &Item)> {
        self.order.iter().filter_map(|&k| self.items.get(k).map(|i| (k, i)))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let item = Item::new("001", "Food Packet", Extent::new(10, 10, 20))
            .with_priority(80.0)
            .with_zone("Crew Quarters")
            .with_expiry("2025-05-20");
        assert_eq!(item.id, ItemId::new("001"));
        assert_eq!(item.priority, f64_to_fixed64(80.0));
        assert_eq!(item.preferred_zone, ZoneId::new("Crew Quarters"));
        assert_eq!(item.meta.expiry_date.as_deref(), Some("2025-05-20"));
        assert_eq!(item.volume(), 2000);
    }

    #[test]
    fn table_preserves_insertion_order() {
        let mut table = ItemTable::new();
        for id in ["c", "a", "b"] {
            table.insert(Item::new(id, id, Extent::new(1, 1, 1)));
        }
        let ids: Vec<&str> = table.iter().map(|(_, i)| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn reinserting_an_id_returns_the_same_key() {
        let mut table = ItemTable::new();
        let first = table.insert(Item::new("x", "first", Extent::new(1, 1, 1)));
        let again = table.insert(Item::new("x", "second", Extent::new(2, 2, 2)));
        assert_eq!(first, again);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(first).unwrap().name, "first");
    }

    #[test]
    fn lookup_by_id() {
        let mut table = ItemTable::new();
        let key = table.insert(Item::new("x", "x", Extent::new(1, 1, 1)));
        assert_eq!(table.key_of(&ItemId::new("x")), Some(key));
        assert_eq!(table.key_of(&ItemId::new("y")), None);
        assert_eq!(table.id_of(key), Some(&ItemId::new("x")));
    }
}
