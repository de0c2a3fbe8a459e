//! Containers, their per-container placement state, and the registry that
//! owns every container in an engine.

use crate::free_space::FreeSpaceIndex;
use crate::geometry::{Cuboid, Extent};
use crate::id::{ContainerId, ContainerKey, ItemKey, ZoneId};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A storage container. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub zone: ZoneId,
    pub extent: Extent,
}

impl Container {
    pub fn new(id: impl Into<String>, zone: impl Into<String>, extent: Extent) -> Self {
        Self {
            id: ContainerId::new(id),
            zone: ZoneId::new(zone),
            extent,
        }
    }

    /// The container interior as a box at the origin.
    pub fn bounds(&self) -> Cuboid {
        Cuboid::at_origin(self.extent)
    }

    pub fn volume(&self) -> u64 {
        self.extent.volume()
    }

    /// True if an item of `extent` could fit in the empty container.
    pub fn can_hold(&self, extent: &Extent) -> bool {
        extent.fits_within(&self.extent) && extent.volume() <= self.volume()
    }
}

/// An item occupying a box inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedItem {
    pub item: ItemKey,
    pub bounds: Cuboid,
}

/// Errors from container mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("box lies outside the container")]
    OutOfBounds,
    #[error("box overlaps a placed item")]
    Occupied,
    #[error("item is not placed")]
    NotPlaced,
    #[error("item is already placed")]
    AlreadyPlaced,
    #[error("container not found")]
    UnknownContainer,
}

// ---------------------------------------------------------------------------
// ContainerState
// ---------------------------------------------------------------------------

/// Placement state of one container: the items inside it, in placement order,
/// and the free space around them.
#[derive(Debug, Clone)]
pub struct ContainerState {
    container: Container,
    placed: Vec<PlacedItem>,
    free: FreeSpaceIndex,
}

impl ContainerState {
    pub fn new(container: Container) -> Self {
        let free = FreeSpaceIndex::new(container.extent);
        Self {
            container,
            placed: Vec::new(),
            free,
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Placed items, oldest first.
    pub fn placed(&self) -> &[PlacedItem] {
        &self.placed
    }

    pub fn free_space(&self) -> &FreeSpaceIndex {
        &self.free
    }

    pub fn item_count(&self) -> usize {
        self.placed.len()
    }

    pub fn bounds_of(&self, item: ItemKey) -> Option<Cuboid> {
        self.placed.iter().find(|p| p.item == item).map(|p| p.bounds)
    }

    /// True if `region` overlaps any placed item other than `except`.
    pub fn collides(&self, region: &Cuboid, except: Option<ItemKey>) -> bool {
        self.placed
            .iter()
            .any(|p| Some(p.item) != except && p.bounds.intersects(region))
    }

    pub fn used_volume(&self) -> u64 {
        self.placed.iter().map(|p| p.bounds.volume()).sum()
    }

    pub fn free_volume(&self) -> u64 {
        self.container.volume() - self.used_volume()
    }

    /// Fraction of the container volume in use, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        self.used_volume() as f64 / self.container.volume() as f64
    }

    // -- Mutation --

    /// Place through the free-space index.
    fn try_place(&mut self, item: ItemKey, extent: &Extent) -> Option<Cuboid> {
        let origin = self.free.try_place(extent)?;
        let bounds = Cuboid::new(origin, *extent);
        self.placed.push(PlacedItem { item, bounds });
        Some(bounds)
    }

    /// Place at an exact box after checking bounds and collisions.
    fn place_exact(&mut self, item: ItemKey, bounds: Cuboid) -> Result<(), SpatialError> {
        if !self.container.bounds().contains(&bounds) {
            return Err(SpatialError::OutOfBounds);
        }
        if self.collides(&bounds, None) {
            return Err(SpatialError::Occupied);
        }
        self.free.occupy(&bounds);
        self.placed.push(PlacedItem { item, bounds });
        Ok(())
    }

    /// Take an item out. Its box becomes free space.
    fn remove(&mut self, item: ItemKey) -> Option<Cuboid> {
        let idx = self.placed.iter().position(|p| p.item == item)?;
        let PlacedItem { bounds, .. } = self.placed.remove(idx);
        self.free.release(bounds);
        Some(bounds)
    }

    /// Move an item to another box in the same container. Returns the old box.
    fn relocate(&mut self, item: ItemKey, to: Cuboid) -> Result<Cuboid, SpatialError> {
        let idx = self
            .placed
            .iter()
            .position(|p| p.item == item)
            .ok_or(SpatialError::NotPlaced)?;
        if !self.container.bounds().contains(&to) {
            return Err(SpatialError::OutOfBounds);
        }
        if self.collides(&to, Some(item)) {
            return Err(SpatialError::Occupied);
        }
        let from = self.placed[idx].bounds;
        self.free.release(from);
        self.free.occupy(&to);
        self.placed[idx].bounds = to;
        Ok(from)
    }

    /// Remove everything and reset the free space.
    fn clear(&mut self) -> Vec<ItemKey> {
        self.free = FreeSpaceIndex::new(self.container.extent);
        self.placed.drain(..).map(|p| p.item).collect()
    }
}

// ---------------------------------------------------------------------------
// ContainerRegistry
// ---------------------------------------------------------------------------

/// Arena of every container in an engine, addressed by key.
///
/// Maintains a bidirectional mapping:
/// - container -> placed items (inside each [`ContainerState`])
/// - `locations`: item -> container it currently sits in
///
/// All placement mutations go through the registry so both sides stay in
/// sync.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: SlotMap<ContainerKey, ContainerState>,
    by_id: HashMap<ContainerId, ContainerKey>,
    order: Vec<ContainerKey>,
    locations: SecondaryMap<ItemKey, ContainerKey>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container. A known id returns its existing key.
    pub fn insert(&mut self, container: Container) -> ContainerKey {
        if let Some(&key) = self.by_id.get(&container.id) {
            return key;
        }
        let id = container.id.clone();
        let key = self.containers.insert(ContainerState::new(container));
        self.by_id.insert(id, key);
        self.order.push(key);
        key
    }

    pub fn get(&self, key: ContainerKey) -> Option<&ContainerState> {
        self.containers.get(key)
    }

    pub fn key_of(&self, id: &ContainerId) -> Option<ContainerKey> {
        self.by_id.get(id).copied()
    }

    /// Container keys in registration order.
    pub fn keys(&self) -> &[ContainerKey] {
        &self.order
    }

    /// Containers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ContainerKey, &ContainerState)> {
        self.order
            .iter()
            .filter_map(|&k| self.containers.get(k).map(|s| (k, s)))
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Where an item currently sits.
    pub fn location(&self, item: ItemKey) -> Option<(ContainerKey, Cuboid)> {
        let &container = self.locations.get(item)?;
        let bounds = self.containers.get(container)?.bounds_of(item)?;
        Some((container, bounds))
    }

    pub fn is_placed(&self, item: ItemKey) -> bool {
        self.locations.contains_key(item)
    }

    /// Place through the container's free-space index.
    pub fn try_place(
        &mut self,
        container: ContainerKey,
        item: ItemKey,
        extent: &Extent,
    ) -> Option<Cuboid> {
        if self.locations.contains_key(item) {
            return None;
        }
        let bounds = self.containers.get_mut(container)?.try_place(item, extent)?;
        self.locations.insert(item, container);
        Some(bounds)
    }

    /// Place at an exact box.
    pub fn place_exact(
        &mut self,
        container: ContainerKey,
        item: ItemKey,
        bounds: Cuboid,
    ) -> Result<(), SpatialError> {
        if self.locations.contains_key(item) {
            return Err(SpatialError::AlreadyPlaced);
        }
        self.containers
            .get_mut(container)
            .ok_or(SpatialError::UnknownContainer)?
            .place_exact(item, bounds)?;
        self.locations.insert(item, container);
        Ok(())
    }

    /// Take an item out of whichever container holds it.
    pub fn remove_item(&mut self, item: ItemKey) -> Result<(ContainerKey, Cuboid), SpatialError> {
        let container = self.locations.remove(item).ok_or(SpatialError::NotPlaced)?;
        let bounds = self
            .containers
            .get_mut(container)
            .and_then(|s| s.remove(item))
            .ok_or(SpatialError::NotPlaced)?;
        Ok((container, bounds))
    }

    /// Move an item to a new box inside its current container.
    pub fn relocate_within(&mut self, item: ItemKey, to: Cuboid) -> Result<Cuboid, SpatialError> {
        let &container = self.locations.get(item).ok_or(SpatialError::NotPlaced)?;
        self.containers
            .get_mut(container)
            .ok_or(SpatialError::UnknownContainer)?
            .relocate(item, to)
    }

    /// Remove every item from a container. Returns them in placement order.
    pub fn clear(&mut self, container: ContainerKey) -> Result<Vec<ItemKey>, SpatialError> {
        let removed = self
            .containers
            .get_mut(container)
            .ok_or(SpatialError::UnknownContainer)?
            .clear();
        for &item in &removed {
            self.locations.remove(item);
        }
        Ok(removed)
    }
}
