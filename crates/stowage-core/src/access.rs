//! Accessibility model: which items occlude the path to an item from the
//! container's open face (`y == 0`).
//!
//! These queries never mutate state. Retrieval planning, the engine's
//! accessibility queries and the rearranger's blocking test are built on
//! them.

use crate::container::{ContainerState, PlacedItem};
use crate::geometry::{Cuboid, Extent, Position};
use crate::id::ItemKey;

/// True if the two boxes overlap in width and height, i.e. their faces as
/// seen from the open face intersect. Depth is ignored.
pub fn shares_face(a: &Cuboid, b: &Cuboid) -> bool {
    a.overlaps_x(b) && a.overlaps_z(b)
}

/// True if `other` sits in front of a box at `position` with `extent`: it
/// starts nearer the open face and [`shares_face`] with the box.
pub fn occludes(other: &Cuboid, position: &Position, extent: &Extent) -> bool {
    other.origin.y < position.y && shares_face(other, &Cuboid::new(*position, *extent))
}

/// True if nothing in `state` blocks the access path to a box at `position`.
///
/// A box at the open face is always accessible. `except` is the item being
/// asked about, so it never blocks itself.
pub fn is_accessible(
    state: &ContainerState,
    position: &Position,
    extent: &Extent,
    except: Option<ItemKey>,
) -> bool {
    if position.y == 0 {
        return true;
    }
    !state
        .placed()
        .iter()
        .any(|p| Some(p.item) != except && occludes(&p.bounds, position, extent))
}

/// Items in front of `item`, nearest the open face first.
///
/// Returns an empty list if the item is accessible or not in this container.
pub fn blocking_items(state: &ContainerState, item: ItemKey) -> Vec<PlacedItem> {
    let Some(bounds) = state.bounds_of(item) else {
        return Vec::new();
    };
    if bounds.origin.y == 0 {
        return Vec::new();
    }

    let mut blockers: Vec<PlacedItem> = state
        .placed()
        .iter()
        .filter(|p| p.item != item && occludes(&p.bounds, &bounds.origin, &bounds.extent))
        .copied()
        .collect();
    blockers.sort_by_key(|p| p.bounds.origin.y);
    blockers
}

/// Number of items that must come out before `item` can be retrieved, or
/// `None` if the item is not in this container.
pub fn retrieval_steps(state: &ContainerState, item: ItemKey) -> Option<usize> {
    state.bounds_of(item)?;
    Some(blocking_items(state, item).len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Container, ContainerRegistry};
    use crate::id::ContainerKey;
    use slotmap::SlotMap;

    fn cube(x: u32, y: u32, z: u32, w: u32, d: u32, h: u32) -> Cuboid {
        Cuboid::new(Position::new(x, y, z), Extent::new(w, d, h))
    }

    fn setup(boxes: &[Cuboid]) -> (ContainerRegistry, ContainerKey, Vec<ItemKey>) {
        let mut sm: SlotMap<ItemKey, ()> = SlotMap::with_key();
        let mut reg = ContainerRegistry::new();
        let ck = reg.insert(Container::new("c", "z", Extent::new(20, 20, 20)));
        let keys: Vec<ItemKey> = boxes
            .iter()
            .map(|&b| {
                let k = sm.insert(());
                reg.place_exact(ck, k, b).unwrap();
                k
            })
            .collect();
        (reg, ck, keys)
    }

    #[test]
    fn front_face_is_always_accessible() {
        let (reg, ck, keys) = setup(&[cube(0, 0, 0, 5, 5, 5)]);
        let state = reg.get(ck).unwrap();
        assert!(is_accessible(
            state,
            &Position::new(0, 0, 0),
            &Extent::new(5, 5, 5),
            Some(keys[0])
        ));
    }

    #[test]
    fn item_behind_another_is_blocked() {
        let (reg, ck, keys) = setup(&[cube(0, 0, 0, 5, 5, 5), cube(0, 5, 0, 5, 5, 5)]);
        let state = reg.get(ck).unwrap();

        let back = state.bounds_of(keys[1]).unwrap();
        assert!(!is_accessible(state, &back.origin, &back.extent, Some(keys[1])));

        let blockers = blocking_items(state, keys[1]);
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].item, keys[0]);
        assert_eq!(retrieval_steps(state, keys[1]), Some(1));
        assert_eq!(retrieval_steps(state, keys[0]), Some(0));
    }

    #[test]
    fn side_by_side_does_not_block() {
        // Front item is beside the back item's width span.
        let (reg, ck, keys) = setup(&[cube(5, 0, 0, 5, 5, 5), cube(0, 5, 0, 5, 5, 5)]);
        let state = reg.get(ck).unwrap();
        assert!(blocking_items(state, keys[1]).is_empty());
    }

    #[test]
    fn stacked_above_does_not_block() {
        let (reg, ck, keys) = setup(&[cube(0, 0, 5, 5, 5, 5), cube(0, 5, 0, 5, 5, 5)]);
        let state = reg.get(ck).unwrap();
        assert!(blocking_items(state, keys[1]).is_empty());
    }

    #[test]
    fn blockers_sorted_front_first() {
        let (reg, ck, keys) = setup(&[
            cube(0, 4, 0, 5, 4, 5),
            cube(0, 0, 0, 5, 4, 5),
            cube(0, 8, 0, 5, 4, 5),
        ]);
        let state = reg.get(ck).unwrap();
        let order: Vec<ItemKey> = blocking_items(state, keys[2]).iter().map(|p| p.item).collect();
        assert_eq!(order, vec![keys[1], keys[0]]);
    }

    #[test]
    fn unknown_item_has_no_steps() {
        let (reg, ck, _keys) = setup(&[cube(0, 0, 0, 1, 1, 1)]);
        let mut sm: SlotMap<ItemKey, ()> = SlotMap::with_key();
        sm.insert(());
        let stranger = sm.insert(());
        assert_eq!(retrieval_steps(reg.get(ck).unwrap(), stranger), None);
    }
}
