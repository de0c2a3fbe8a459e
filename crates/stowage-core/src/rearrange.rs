//! Rearrangement: clearing room for an item that fits in no free space.
//!
//! The engine fixes a candidate region on the target container's floor and
//! resolves the items blocking it (see [`blocks`]) one at a time, topmost
//! first:
//!
//! 1. **Shift** the blocker straight up by the new item's height, if it stays
//!    inside the container and collides with nothing.
//! 2. **Move** it into another container through the placement policy.
//! 3. **Remove** it from the container entirely.
//!
//! After each step the item is retried. Every step is appended to the
//! [`RearrangementLog`] with a run-wide step number.

use crate::access;
use crate::container::{ContainerRegistry, PlacedItem, SpatialError};
use crate::geometry::{Cuboid, Extent, Position};
use crate::id::{ContainerId, ContainerKey, ItemId, ItemKey};
use crate::item::ItemTable;
use crate::policy::PlacementPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Log types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RearrangementAction {
    Shift,
    Move,
    Remove,
}

/// One end of a rearrangement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub container: ContainerId,
    pub start: Position,
    pub end: Position,
}

impl Site {
    fn new(container: ContainerId, bounds: &Cuboid) -> Self {
        Self {
            container,
            start: bounds.origin,
            end: bounds.end(),
        }
    }
}

/// A recorded corrective action. Never mutated after it is logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RearrangementRecord {
    pub step: u64,
    pub action: RearrangementAction,
    pub item: ItemId,
    pub from: Site,
    /// Empty for [`RearrangementAction::Remove`].
    pub to: Option<Site>,
}

/// Append-only log of rearrangement steps. Step numbers start at 1 and
/// increase by one per record for the lifetime of the log.
#[derive(Debug, Clone, Default)]
pub struct RearrangementLog {
    records: Vec<RearrangementRecord>,
}

impl RearrangementLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(
        &mut self,
        action: RearrangementAction,
        item: ItemId,
        from: Site,
        to: Option<Site>,
    ) -> u64 {
        let step = self.records.len() as u64 + 1;
        log::debug!(
            "rearrangement step {step}: {action:?} {item} from {} {:?}",
            from.container,
            from.start
        );
        self.records.push(RearrangementRecord {
            step,
            action,
            item,
            from,
            to,
        });
        step
    }

    pub fn records(&self) -> &[RearrangementRecord] {
        &self.records
    }

    /// Records appended after the first `len` records.
    pub fn since(&self, len: usize) -> &[RearrangementRecord] {
        self.records.get(len..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RearrangeError {
    #[error("rearrangement exceeded {limit} steps")]
    RecursionLimitExceeded { limit: usize },
    #[error("container cannot hold the item")]
    NoCandidate,
    #[error("item is not registered")]
    UnknownItem,
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

// ---------------------------------------------------------------------------
// Rearranger
// ---------------------------------------------------------------------------

/// Runs one rearrangement cascade against a borrowed container registry.
pub struct Rearranger<'a> {
    registry: &'a mut ContainerRegistry,
    items: &'a ItemTable,
    log: &'a mut RearrangementLog,
    policy: PlacementPolicy,
    cross_container_moves: bool,
    max_depth: Option<usize>,
    evicted: Vec<ItemKey>,
}

impl<'a> Rearranger<'a> {
    pub fn new(
        registry: &'a mut ContainerRegistry,
        items: &'a ItemTable,
        log: &'a mut RearrangementLog,
        policy: PlacementPolicy,
    ) -> Self {
        Self {
            registry,
            items,
            log,
            policy,
            cross_container_moves: true,
            max_depth: None,
            evicted: Vec::new(),
        }
    }

    /// Forbid `move` steps; blockers that cannot shift are removed.
    pub fn cross_container_moves(mut self, allowed: bool) -> Self {
        self.cross_container_moves = allowed;
        self
    }

    /// Override the per-cascade step bound (default: items in the container
    /// when the cascade starts, plus one).
    pub fn max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    /// Items removed by `remove` steps so far.
    pub fn evicted(&self) -> &[ItemKey] {
        &self.evicted
    }

    pub fn into_evicted(self) -> Vec<ItemKey> {
        self.evicted
    }

    /// Place `key` in `container`, rearranging blockers as needed.
    ///
    /// On failure, steps already taken stay applied and logged.
    pub fn place(&mut self, container: ContainerKey, key: ItemKey) -> Result<Cuboid, RearrangeError> {
        let items = self.items;
        let item = items.get(key).ok_or(RearrangeError::UnknownItem)?;
        if let Some(bounds) = self.registry.try_place(container, key, &item.extent) {
            return Ok(bounds);
        }

        let state = self
            .registry
            .get(container)
            .ok_or(SpatialError::UnknownContainer)?;
        let limit = self.max_depth.unwrap_or(state.item_count() + 1);
        let candidate =
            choose_candidate(self.registry, container, &item.extent).ok_or(RearrangeError::NoCandidate)?;
        log::debug!(
            "rearranging {} for {} at {:?}",
            state.container().id,
            item.id,
            candidate.origin
        );

        let mut visited = HashSet::new();
        self.resolve(container, key, &candidate, &mut visited, 0, limit)
    }

    fn resolve(
        &mut self,
        container: ContainerKey,
        key: ItemKey,
        candidate: &Cuboid,
        visited: &mut HashSet<ItemKey>,
        depth: usize,
        limit: usize,
    ) -> Result<Cuboid, RearrangeError> {
        let Some(blocker) = ordered_blockers(self.registry, container, candidate)
            .first()
            .copied()
        else {
            // Region is clear but the free-space index is too fragmented to
            // offer it as one box.
            self.registry.place_exact(container, key, *candidate)?;
            return Ok(*candidate);
        };

        if depth >= limit || !visited.insert(blocker.item) {
            return Err(RearrangeError::RecursionLimitExceeded { limit });
        }

        self.clear_blocker(container, blocker, candidate.extent.height)?;

        if let Some(bounds) = self.registry.try_place(container, key, &candidate.extent) {
            return Ok(bounds);
        }
        self.resolve(container, key, candidate, visited, depth + 1, limit)
    }

    fn clear_blocker(
        &mut self,
        container: ContainerKey,
        blocker: PlacedItem,
        lift: u32,
    ) -> Result<(), RearrangeError> {
        let items = self.items;
        let item = items.get(blocker.item).ok_or(RearrangeError::UnknownItem)?;
        let state = self
            .registry
            .get(container)
            .ok_or(SpatialError::UnknownContainer)?;
        let source_id = state.container().id.clone();
        let from = Site::new(source_id.clone(), &blocker.bounds);

        // 1. Shift straight up.
        let raised = blocker.bounds.raised(lift).filter(|r| {
            r.top() <= state.container().extent.height && !state.collides(r, Some(blocker.item))
        });
        if let Some(raised) = raised {
            self.registry.relocate_within(blocker.item, raised)?;
            self.log.record(
                RearrangementAction::Shift,
                item.id.clone(),
                from,
                Some(Site::new(source_id, &raised)),
            );
            return Ok(());
        }

        self.registry.remove_item(blocker.item)?;

        // 2. Move to another container.
        if self.cross_container_moves {
            if let Some((dest, bounds)) =
                self.policy
                    .place(self.registry, blocker.item, item, Some(container))
            {
                let dest_id = self
                    .registry
                    .get(dest)
                    .map(|s| s.container().id.clone())
                    .ok_or(SpatialError::UnknownContainer)?;
                self.log.record(
                    RearrangementAction::Move,
                    item.id.clone(),
                    from,
                    Some(Site::new(dest_id, &bounds)),
                );
                return Ok(());
            }
        }

        // 3. Remove.
        self.log
            .record(RearrangementAction::Remove, item.id.clone(), from, None);
        self.evicted.push(blocker.item);
        Ok(())
    }
}

/// True if `other` stands in the way of a candidate region: seen from the
/// open face it overlaps the region in width and height, and its bottom lies
/// below the clearance the region needs. Depth is not considered, so an item
/// directly behind the region blocks it too.
pub fn blocks(other: &Cuboid, candidate: &Cuboid) -> bool {
    access::shares_face(other, candidate) && other.origin.z < candidate.top()
}

/// Blockers of `candidate`, in the order they are resolved: highest top
/// first, then most recently placed.
fn ordered_blockers(
    registry: &ContainerRegistry,
    container: ContainerKey,
    candidate: &Cuboid,
) -> Vec<PlacedItem> {
    let Some(state) = registry.get(container) else {
        return Vec::new();
    };
    let mut blockers: Vec<(usize, PlacedItem)> = state
        .placed()
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| blocks(&p.bounds, candidate))
        .collect();
    blockers.sort_by(|(ia, a), (ib, b)| {
        b.bounds
            .top()
            .cmp(&a.bounds.top())
            .then_with(|| ib.cmp(ia))
    });
    blockers.into_iter().map(|(_, p)| p).collect()
}

/// Pick the floor-level region to clear for an item of `extent`.
///
/// Anchors are the container origin and the floor-level origins of free
/// spaces and placed items. The in-bounds anchor with the fewest blockers
/// wins, ties broken by position.
fn choose_candidate(
    registry: &ContainerRegistry,
    container: ContainerKey,
    extent: &Extent,
) -> Option<Cuboid> {
    let state = registry.get(container)?;
    let bounds = state.container().bounds();

    let mut anchors: Vec<Position> = std::iter::once(Position::ORIGIN)
        .chain(state.free_space().spaces().iter().map(|s| s.origin))
        .chain(state.placed().iter().map(|p| p.bounds.origin))
        .filter(|p| p.z == 0)
        .collect();
    anchors.sort_by_key(|p| p.order_key());
    anchors.dedup();

    anchors
        .into_iter()
        .map(|origin| Cuboid::new(origin, *extent))
        .filter(|c| bounds.contains(c))
        .min_by_key(|c| {
            let count = state
                .placed()
                .iter()
                .filter(|p| blocks(&p.bounds, c))
                .count();
            (count, c.origin.order_key())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::item::Item;

    fn cube(x: u32, y: u32, z: u32, w: u32, d: u32, h: u32) -> Cuboid {
        Cuboid::new(Position::new(x, y, z), Extent::new(w, d, h))
    }

    struct World {
        registry: ContainerRegistry,
        items: ItemTable,
        log: RearrangementLog,
    }

    impl World {
        fn new(containers: &[(&str, Extent)]) -> (Self, Vec<ContainerKey>) {
            let mut registry = ContainerRegistry::new();
            let keys = containers
                .iter()
                .map(|(id, e)| registry.insert(Container::new(*id, "Storage", *e)))
                .collect();
            (
                Self {
                    registry,
                    items: ItemTable::new(),
                    log: RearrangementLog::new(),
                },
                keys,
            )
        }

        fn put(&mut self, container: ContainerKey, id: &str, bounds: Cuboid) -> ItemKey {
            let key = self
                .items
                .insert(Item::new(id, id, bounds.extent).with_zone("Storage"));
            self.registry.place_exact(container, key, bounds).unwrap();
            key
        }

        fn add(&mut self, id: &str, extent: Extent) -> ItemKey {
            self.items
                .insert(Item::new(id, id, extent).with_zone("Storage"))
        }

        fn rearranger(&mut self) -> Rearranger<'_> {
            Rearranger::new(
                &mut self.registry,
                &self.items,
                &mut self.log,
                PlacementPolicy::default(),
            )
        }
    }

    #[test]
    fn blocks_requires_width_and_height_overlap() {
        let candidate = cube(0, 0, 0, 5, 5, 5);
        assert!(blocks(&cube(0, 0, 0, 5, 5, 5), &candidate));
        assert!(blocks(&cube(4, 4, 4, 5, 5, 5), &candidate));
        // Beside the region, or resting on its top.
        assert!(!blocks(&cube(5, 0, 0, 5, 5, 5), &candidate));
        assert!(!blocks(&cube(0, 0, 5, 5, 5, 5), &candidate));
    }

    #[test]
    fn item_behind_the_region_still_blocks() {
        let candidate = cube(0, 0, 0, 5, 5, 5);
        assert!(blocks(&cube(0, 8, 0, 5, 2, 5), &candidate));
        assert!(blocks(&cube(2, 15, 3, 1, 1, 1), &candidate));
        assert!(!blocks(&cube(0, 8, 5, 5, 2, 5), &candidate));
    }

    #[test]
    fn fits_without_rearranging() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        let item = w.add("x", Extent::new(5, 5, 5));
        let bounds = w.rearranger().place(c[0], item).unwrap();
        assert_eq!(bounds, cube(0, 0, 0, 5, 5, 5));
        assert!(w.log.is_empty());
    }

    #[test]
    fn shifts_blocker_up_when_headroom_allows() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        // A short box on the left and a raised box on the right leave no
        // full-width gap 4 high anywhere.
        let low = w.put(c[0], "low", cube(0, 0, 0, 5, 10, 3));
        w.put(c[0], "raised", cube(5, 0, 4, 5, 10, 6));
        let item = w.add("x", Extent::new(10, 10, 4));

        let bounds = w.rearranger().place(c[0], item).unwrap();
        assert_eq!(bounds, cube(0, 0, 0, 10, 10, 4));

        let records = w.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, RearrangementAction::Shift);
        assert_eq!(records[0].step, 1);
        assert_eq!(records[0].item, ItemId::new("low"));
        assert_eq!(records[0].from.start, Position::ORIGIN);
        assert_eq!(
            records[0].to.as_ref().unwrap().start,
            Position::new(0, 0, 4)
        );
        assert_eq!(
            w.registry.location(low).unwrap().1,
            cube(0, 0, 4, 5, 10, 3)
        );
    }

    #[test]
    fn removes_blocker_when_nothing_else_works() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        let a = w.put(c[0], "A", cube(0, 0, 0, 10, 10, 10));
        let b = w.add("B", Extent::new(5, 5, 5));

        let mut r = w.rearranger();
        let bounds = r.place(c[0], b).unwrap();
        assert_eq!(r.evicted(), &[a]);
        assert_eq!(bounds, cube(0, 0, 0, 5, 5, 5));

        let records = w.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, RearrangementAction::Remove);
        assert!(records[0].to.is_none());
        assert!(!w.registry.is_placed(a));
    }

    #[test]
    fn moves_blocker_to_another_container() {
        let (mut w, c) = World::new(&[
            ("c1", Extent::new(10, 10, 10)),
            ("c2", Extent::new(10, 10, 8)),
        ]);
        let a = w.put(c[0], "A", cube(0, 0, 0, 10, 10, 8));
        let b = w.add("B", Extent::new(10, 10, 9));

        let bounds = w.rearranger().place(c[0], b).unwrap();
        assert_eq!(bounds, cube(0, 0, 0, 10, 10, 9));

        let records = w.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, RearrangementAction::Move);
        let to = records[0].to.as_ref().unwrap();
        assert_eq!(to.container, ContainerId::new("c2"));
        assert_eq!(w.registry.location(a).unwrap().0, c[1]);
    }

    #[test]
    fn moves_disabled_falls_through_to_remove() {
        let (mut w, c) = World::new(&[
            ("c1", Extent::new(10, 10, 10)),
            ("c2", Extent::new(10, 10, 8)),
        ]);
        w.put(c[0], "A", cube(0, 0, 0, 10, 10, 8));
        let b = w.add("B", Extent::new(10, 10, 9));

        let mut r = w.rearranger().cross_container_moves(false);
        r.place(c[0], b).unwrap();
        assert_eq!(r.evicted().len(), 1);
        assert_eq!(w.log.records()[0].action, RearrangementAction::Remove);
    }

    #[test]
    fn depth_limit_fails_closed_and_keeps_completed_steps() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        w.put(c[0], "A", cube(0, 0, 0, 5, 10, 10));
        w.put(c[0], "B", cube(5, 0, 0, 5, 10, 10));
        let x = w.add("X", Extent::new(10, 10, 10));

        let mut r = w.rearranger().max_depth(Some(1));
        let err = r.place(c[0], x).unwrap_err();
        assert_eq!(err, RearrangeError::RecursionLimitExceeded { limit: 1 });
        assert_eq!(r.evicted().len(), 1);
        assert_eq!(w.log.len(), 1);
        assert!(!w.registry.is_placed(x));
    }

    #[test]
    fn step_numbers_are_contiguous() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        w.put(c[0], "A", cube(0, 0, 0, 5, 10, 10));
        w.put(c[0], "B", cube(5, 0, 0, 5, 10, 10));
        let x = w.add("X", Extent::new(10, 10, 10));

        w.rearranger().place(c[0], x).unwrap();
        let steps: Vec<u64> = w.log.records().iter().map(|r| r.step).collect();
        assert_eq!(steps, vec![1, 2]);
        assert_eq!(w.log.since(1).len(), 1);
        assert!(w.log.since(5).is_empty());
    }

    #[test]
    fn shift_refused_when_raised_box_hits_an_item_above() {
        let (mut w, c) = World::new(&[
            ("c1", Extent::new(10, 10, 10)),
            ("c2", Extent::new(10, 10, 10)),
        ]);
        let base = w.put(c[0], "base", cube(0, 0, 0, 5, 10, 2));
        let top = w.put(c[0], "top", cube(0, 0, 2, 5, 10, 3));
        w.put(c[0], "wall", cube(5, 0, 0, 5, 10, 10));
        let x = w.add("X", Extent::new(10, 10, 2));

        let bounds = w.rearranger().place(c[0], x).unwrap();
        assert_eq!(bounds, cube(0, 0, 0, 10, 10, 2));

        // The wall has no headroom and moves first. Raising the base by 2
        // would run into the item stacked on it, so it moves as well.
        let records = w.log.records();
        let summary: Vec<(RearrangementAction, &str)> = records
            .iter()
            .map(|r| (r.action, r.item.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (RearrangementAction::Move, "wall"),
                (RearrangementAction::Move, "base")
            ]
        );
        assert!(records.iter().all(|r| r.action != RearrangementAction::Shift));
        assert_eq!(w.registry.location(base).unwrap().0, c[1]);
        assert_eq!(
            w.registry.location(top).unwrap(),
            (c[0], cube(0, 0, 2, 5, 10, 3))
        );
    }

    #[test]
    fn blocker_is_never_handled_twice_in_one_cascade() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        let a = w.put(c[0], "A", cube(0, 0, 0, 10, 10, 10));
        let b = w.add("B", Extent::new(5, 5, 5));
        let candidate = cube(0, 0, 0, 5, 5, 5);

        let mut visited = HashSet::from([a]);
        let err = w
            .rearranger()
            .resolve(c[0], b, &candidate, &mut visited, 0, 5)
            .unwrap_err();
        assert_eq!(err, RearrangeError::RecursionLimitExceeded { limit: 5 });
        assert!(w.log.is_empty());
        assert_eq!(w.registry.location(a).unwrap().1, cube(0, 0, 0, 10, 10, 10));
        assert!(!w.registry.is_placed(b));
    }

    #[test]
    fn candidate_prefers_fewest_blockers() {
        let (mut w, c) = World::new(&[("c", Extent::new(20, 10, 10))]);
        w.put(c[0], "A", cube(0, 0, 0, 10, 10, 10));
        w.put(c[0], "B", cube(10, 0, 0, 5, 10, 10));
        let candidate = choose_candidate(&w.registry, c[0], &Extent::new(10, 10, 10)).unwrap();
        // Anchors at x=0 and x=10 each hit one item; the origin wins the tie.
        assert_eq!(candidate.origin, Position::ORIGIN);
        let candidate = choose_candidate(&w.registry, c[0], &Extent::new(5, 10, 10)).unwrap();
        assert_eq!(candidate.origin, Position::new(15, 0, 0));
    }

    #[test]
    fn candidate_counts_items_behind_it() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        // The left column has one tall box at the back. The right column
        // has a low box at the front and another behind it.
        w.put(c[0], "behind_left", cube(0, 5, 0, 5, 5, 10));
        w.put(c[0], "front_right", cube(5, 0, 0, 5, 5, 4));
        w.put(c[0], "back_right", cube(5, 5, 0, 5, 5, 4));
        let candidate = choose_candidate(&w.registry, c[0], &Extent::new(5, 5, 6)).unwrap();
        // Left anchors see one blocker, right anchors two.
        assert_eq!(candidate.origin, Position::ORIGIN);
        let blockers = ordered_blockers(&w.registry, c[0], &candidate);
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].bounds, cube(0, 5, 0, 5, 5, 10));
    }

    #[test]
    fn topmost_blockers_resolve_first() {
        let (mut w, c) = World::new(&[("c", Extent::new(10, 10, 10))]);
        let short_old = w.put(c[0], "short_old", cube(0, 0, 0, 5, 10, 5));
        let tall = w.put(c[0], "tall", cube(5, 0, 0, 5, 5, 10));
        let short_new = w.put(c[0], "short_new", cube(5, 5, 0, 5, 5, 5));
        let candidate = cube(0, 0, 0, 10, 10, 10);
        let order: Vec<ItemKey> = ordered_blockers(&w.registry, c[0], &candidate)
            .iter()
            .map(|p| p.item)
            .collect();
        assert_eq!(order, vec![tall, short_new, short_old]);
    }
}
