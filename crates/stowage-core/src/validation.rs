//! Input validation and geometric invariant checks.
//!
//! Input validation runs before a request touches engine state. Invariant
//! checks walk a registry read-only and report every violation they find;
//! with the `parallel` feature the containers are checked on the rayon pool.

use crate::container::{Container, ContainerRegistry, ContainerState};
use crate::geometry::{Cuboid, Extent};
use crate::id::{ContainerId, ItemKey};
use crate::item::Item;
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Every axis non-zero and the volume representable, so later volume and
/// leftover arithmetic cannot overflow.
fn extent_is_valid(extent: &Extent) -> bool {
    !extent.is_degenerate() && extent.checked_volume().is_some()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} {id} has a zero dimension or an unrepresentable volume")]
    InvalidDimensions { kind: &'static str, id: String },
    #[error("{kind} id {id} appears more than once")]
    DuplicateId { kind: &'static str, id: String },
}

pub fn validate_containers(containers: &[Container]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for c in containers {
        if !extent_is_valid(&c.extent) {
            return Err(ValidationError::InvalidDimensions {
                kind: "container",
                id: c.id.to_string(),
            });
        }
        if !seen.insert(&c.id) {
            return Err(ValidationError::DuplicateId {
                kind: "container",
                id: c.id.to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_items(items: &[Item]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for item in items {
        if !extent_is_valid(&item.extent) {
            return Err(ValidationError::InvalidDimensions {
                kind: "item",
                id: item.id.to_string(),
            });
        }
        if !seen.insert(&item.id) {
            return Err(ValidationError::DuplicateId {
                kind: "item",
                id: item.id.to_string(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Invariant checks
// ---------------------------------------------------------------------------

/// A broken geometric invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Two items in one container overlap.
    Overlap {
        container: ContainerId,
        a: ItemKey,
        b: ItemKey,
    },
    /// An item extends past its container's walls.
    ItemOutOfBounds { container: ContainerId, item: ItemKey },
    /// A free-space box extends past its container's walls.
    FreeSpaceOutOfBounds { container: ContainerId, space: Cuboid },
    /// A free-space box overlaps a placed item.
    FreeSpaceOccupied {
        container: ContainerId,
        space: Cuboid,
        item: ItemKey,
    },
    /// An item is placed in more than one container.
    MultiplePlacements { item: ItemKey },
}

/// Check every container in `registry`. An empty result means the registry
/// is consistent.
pub fn check_invariants(registry: &ContainerRegistry) -> Vec<Violation> {
    let states: Vec<&ContainerState> = registry.iter().map(|(_, s)| s).collect();

    #[cfg(feature = "parallel")]
    let mut violations: Vec<Violation> = {
        use rayon::prelude::*;
        states
            .par_iter()
            .flat_map_iter(|s| check_container(s))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let mut violations: Vec<Violation> = states.iter().flat_map(|s| check_container(s)).collect();

    let mut seen: HashMap<ItemKey, usize> = HashMap::new();
    for state in &states {
        for p in state.placed() {
            *seen.entry(p.item).or_default() += 1;
        }
    }
    // Walk in container order so the report is deterministic.
    for state in &states {
        for p in state.placed() {
            if seen.get(&p.item).is_some_and(|&n| n > 1) {
                seen.remove(&p.item);
                violations.push(Violation::MultiplePlacements { item: p.item });
            }
        }
    }
    violations
}

fn check_container(state: &ContainerState) -> Vec<Violation> {
    let id = &state.container().id;
    let bounds = state.container().bounds();
    let placed = state.placed();
    let mut out = Vec::new();

    for (i, a) in placed.iter().enumerate() {
        if !bounds.contains(&a.bounds) {
            out.push(Violation::ItemOutOfBounds {
                container: id.clone(),
                item: a.item,
            });
        }
        for b in &placed[i + 1..] {
            if a.bounds.intersects(&b.bounds) {
                out.push(Violation::Overlap {
                    container: id.clone(),
                    a: a.item,
                    b: b.item,
                });
            }
        }
    }

    for space in state.free_space().spaces() {
        if !bounds.contains(space) {
            out.push(Violation::FreeSpaceOutOfBounds {
                container: id.clone(),
                space: *space,
            });
        }
        if let Some(p) = placed.iter().find(|p| p.bounds.intersects(space)) {
            out.push(Violation::FreeSpaceOccupied {
                container: id.clone(),
                space: *space,
                item: p.item,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;
    use slotmap::SlotMap;

    #[test]
    fn zero_dimension_is_rejected() {
        let err = validate_items(&[Item::new("a", "a", Extent::new(1, 0, 1))]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDimensions {
                kind: "item",
                id: "a".into()
            }
        );
        assert!(validate_containers(&[Container::new("c", "z", Extent::new(0, 1, 1))]).is_err());
    }

    #[test]
    fn overflowing_volume_is_rejected() {
        let huge = Extent::new(3_000_000, 3_000_000, 3_000_000);
        let err = validate_containers(&[Container::new("big", "z", huge)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDimensions {
                kind: "container",
                id: "big".into()
            }
        );
        assert!(validate_items(&[Item::new("a", "a", huge)]).is_err());
        // Long but thin is fine.
        let rod = Extent::new(u32::MAX, 1, 1);
        assert!(validate_containers(&[Container::new("rod", "z", rod)]).is_ok());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = validate_containers(&[
            Container::new("c", "z", Extent::new(1, 1, 1)),
            Container::new("c", "y", Extent::new(2, 2, 2)),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateId { kind: "container", .. }));

        let e = Extent::new(1, 1, 1);
        assert!(validate_items(&[Item::new("a", "", e), Item::new("b", "", e)]).is_ok());
        assert!(validate_items(&[Item::new("a", "", e), Item::new("a", "", e)]).is_err());
    }

    #[test]
    fn consistent_registry_has_no_violations() {
        let mut sm: SlotMap<ItemKey, ()> = SlotMap::with_key();
        let mut reg = ContainerRegistry::new();
        let ck = reg.insert(Container::new("c", "z", Extent::new(10, 10, 10)));
        for _ in 0..4 {
            reg.try_place(ck, sm.insert(()), &Extent::new(3, 4, 5)).unwrap();
        }
        let k = sm.insert(());
        reg.place_exact(ck, k, Cuboid::new(Position::new(9, 9, 9), Extent::new(1, 1, 1)))
            .unwrap();
        reg.remove_item(k).unwrap();
        assert!(check_invariants(&reg).is_empty());
    }
}
