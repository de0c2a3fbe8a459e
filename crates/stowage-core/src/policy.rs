//! Placement policy: batch ordering and container choice.

use crate::container::ContainerRegistry;
use crate::geometry::Cuboid;
use crate::id::{ContainerKey, ItemKey, ZoneId};
use crate::item::{Item, ItemTable};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
pub struct PlacementPolicy {
    zone_preference: bool,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PlacementPolicy {
    pub fn new(zone_preference: bool) -> Self {
        Self { zone_preference }
    }

    /// Processing order for a batch: priority descending, then volume
    /// descending, then earliest expiry (undated last), then input order.
    pub fn order(&self, items: &ItemTable, batch: &[ItemKey]) -> Vec<ItemKey> {
        let mut keyed: Vec<(ItemKey, &Item)> = batch
            .iter()
            .filter_map(|&k| items.get(k).map(|i| (k, i)))
            .collect();
        keyed.sort_by(|(_, a), (_, b)| processing_order(a, b));
        keyed.into_iter().map(|(k, _)| k).collect()
    }

    /// Containers to try for an item preferring `zone`: matching zone first,
    /// then the rest, each group in registration order.
    pub fn candidates(
        &self,
        registry: &ContainerRegistry,
        zone: &ZoneId,
        exclude: Option<ContainerKey>,
    ) -> Vec<ContainerKey> {
        let keys = registry
            .keys()
            .iter()
            .copied()
            .filter(|&k| Some(k) != exclude);

        if !self.zone_preference {
            return keys.collect();
        }

        let (mut preferred, rest): (Vec<ContainerKey>, Vec<ContainerKey>) = keys.partition(|&k| {
            registry
                .get(k)
                .is_some_and(|s| &s.container().zone == zone)
        });
        preferred.extend(rest);
        preferred
    }

    /// Place `item` in the first candidate container with a fitting free
    /// space. No rearrangement happens here.
    pub fn place(
        &self,
        registry: &mut ContainerRegistry,
        key: ItemKey,
        item: &Item,
        exclude: Option<ContainerKey>,
    ) -> Option<(ContainerKey, Cuboid)> {
        self.candidates(registry, &item.preferred_zone, exclude)
            .into_iter()
            .find_map(|ck| registry.try_place(ck, key, &item.extent).map(|b| (ck, b)))
    }

    /// The container the rearrangement engine should work on when nothing
    /// fits anywhere: among containers large enough for the item, preferred
    /// zone first, then most free volume, then registration order.
    pub fn rearrangement_target(
        &self,
        registry: &ContainerRegistry,
        item: &Item,
    ) -> Option<ContainerKey> {
        registry
            .iter()
            .enumerate()
            .filter(|(_, (_, s))| s.container().can_hold(&item.extent))
            .min_by(|(ia, (_, a)), (ib, (_, b))| {
                let zone_a = self.zone_preference && a.container().zone == item.preferred_zone;
                let zone_b = self.zone_preference && b.container().zone == item.preferred_zone;
                zone_b
                    .cmp(&zone_a)
                    .then_with(|| b.free_volume().cmp(&a.free_volume()))
                    .then_with(|| ia.cmp(ib))
            })
            .map(|(_, (k, _))| k)
    }
}

fn processing_order(a: &Item, b: &Item) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.volume().cmp(&a.volume()))
        .then_with(|| match (&a.meta.expiry_date, &b.meta.expiry_date) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::geometry::Extent;

    fn ids(items: &ItemTable, keys: &[ItemKey]) -> Vec<String> {
        keys.iter()
            .map(|&k| items.get(k).unwrap().id.to_string())
            .collect()
    }

    #[test]
    fn higher_priority_first() {
        let mut items = ItemTable::new();
        let low = items.insert(Item::new("low", "low", Extent::new(1, 1, 1)).with_priority(10.0));
        let high = items.insert(Item::new("high", "high", Extent::new(1, 1, 1)).with_priority(90.0));
        let order = PlacementPolicy::default().order(&items, &[low, high]);
        assert_eq!(ids(&items, &order), vec!["high", "low"]);
    }

    #[test]
    fn ties_break_on_volume_then_expiry_then_input() {
        let mut items = ItemTable::new();
        let e = Extent::new(2, 2, 2);
        let keys = vec![
            items.insert(Item::new("undated", "", e).with_priority(5.0)),
            items.insert(Item::new("late", "", e).with_priority(5.0).with_expiry("2026-01-01")),
            items.insert(Item::new("big", "", Extent::new(3, 3, 3)).with_priority(5.0)),
            items.insert(Item::new("early", "", e).with_priority(5.0).with_expiry("2025-01-01")),
            items.insert(Item::new("undated2", "", e).with_priority(5.0)),
        ];
        let order = PlacementPolicy::default().order(&items, &keys);
        assert_eq!(
            ids(&items, &order),
            vec!["big", "early", "late", "undated", "undated2"]
        );
    }

    #[test]
    fn candidates_prefer_zone() {
        let mut reg = ContainerRegistry::new();
        let a = reg.insert(Container::new("a", "Airlock", Extent::new(5, 5, 5)));
        let b = reg.insert(Container::new("b", "Lab", Extent::new(5, 5, 5)));
        let c = reg.insert(Container::new("c", "Lab", Extent::new(5, 5, 5)));

        let policy = PlacementPolicy::default();
        assert_eq!(policy.candidates(&reg, &ZoneId::new("Lab"), None), vec![b, c, a]);
        assert_eq!(policy.candidates(&reg, &ZoneId::new("Lab"), Some(b)), vec![c, a]);

        let flat = PlacementPolicy::new(false);
        assert_eq!(flat.candidates(&reg, &ZoneId::new("Lab"), None), vec![a, b, c]);
    }

    #[test]
    fn place_falls_back_to_other_zones() {
        let mut reg = ContainerRegistry::new();
        let small = reg.insert(Container::new("a", "Lab", Extent::new(2, 2, 2)));
        let big = reg.insert(Container::new("b", "Dock", Extent::new(10, 10, 10)));
        let mut items = ItemTable::new();
        let item = Item::new("x", "x", Extent::new(5, 5, 5)).with_zone("Lab");
        let key = items.insert(item.clone());

        let (ck, bounds) = PlacementPolicy::default()
            .place(&mut reg, key, &item, None)
            .unwrap();
        assert_eq!(ck, big);
        assert_ne!(ck, small);
        assert_eq!(bounds, Cuboid::at_origin(Extent::new(5, 5, 5)));
    }

    #[test]
    fn rearrangement_target_prefers_zone_then_free_volume() {
        let mut reg = ContainerRegistry::new();
        let tiny = reg.insert(Container::new("tiny", "Lab", Extent::new(1, 1, 1)));
        let dock = reg.insert(Container::new("dock", "Dock", Extent::new(20, 20, 20)));
        let lab = reg.insert(Container::new("lab", "Lab", Extent::new(10, 10, 10)));
        let item = Item::new("x", "x", Extent::new(5, 5, 5)).with_zone("Lab");

        let policy = PlacementPolicy::default();
        assert_eq!(policy.rearrangement_target(&reg, &item), Some(lab));
        assert_ne!(policy.rearrangement_target(&reg, &item), Some(tiny));

        let flat = PlacementPolicy::new(false);
        assert_eq!(flat.rearrangement_target(&reg, &item), Some(dock));
    }
}
