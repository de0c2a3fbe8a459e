//! The stowage engine: owns every container, item and rearrangement record
//! for one session, and exposes packing, manual placement and read-only
//! queries over them.
//!
//! # Packing
//!
//! [`StowageEngine::pack`] registers a batch, orders it with the
//! [`PlacementPolicy`], and for each item not already placed:
//!
//! 1. tries the free space of every candidate container (preferred zone
//!    first);
//! 2. if nothing fits, runs the [`Rearranger`] on the best capable container;
//! 3. otherwise reports the item unplaced and moves on.
//!
//! The outcome carries the current placement of every item, the
//! rearrangement steps taken during the call, the unplaced items, and the
//! items evicted by `remove` steps.

use crate::access;
use crate::config::EngineConfig;
use crate::container::{Container, ContainerRegistry, SpatialError};
use crate::geometry::{Cuboid, Position};
use crate::id::{ContainerId, ContainerKey, ItemId, ItemKey, ZoneId};
use crate::item::{Item, ItemTable};
use crate::policy::PlacementPolicy;
use crate::rearrange::{RearrangeError, RearrangementLog, RearrangementRecord, Rearranger};
use crate::retrieval::{self, RetrievalStep, RetrievalStrategy};
use crate::validation::{self, ValidationError, Violation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StowageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("container {0} not found")]
    ContainerNotFound(ContainerId),
    #[error("item {0} not found")]
    ItemNotFound(ItemId),
    #[error("item {0} is not placed")]
    NotPlaced(ItemId),
    #[error("item {0} is already placed")]
    AlreadyPlaced(ItemId),
    #[error("item {item} is not in container {container}")]
    NotInContainer { item: ItemId, container: ContainerId },
    #[error("no space for item {item} in container {container}")]
    NoSpace { item: ItemId, container: ContainerId },
    /// An internal key no longer resolves to a registered item or container.
    #[error("stale item or container key")]
    UnknownKey,
}

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    /// No container is large enough on every axis.
    NoCapableContainer,
    /// Capable containers exist but no room could be made.
    NoSpace,
    /// Rearrangement hit its step bound.
    RecursionLimitExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub item: ItemId,
    pub container: ContainerId,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unplaced {
    pub item: ItemId,
    pub reason: UnplacedReason,
}

/// Result of one [`StowageEngine::pack`] call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackingOutcome {
    /// Every placed item, in registration order.
    pub placements: Vec<Placement>,
    /// Steps taken during this call only.
    pub rearrangements: Vec<RearrangementRecord>,
    pub unplaced: Vec<Unplaced>,
    /// Items taken out of their containers by `remove` steps.
    pub evicted: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub container: ContainerId,
    pub zone: ZoneId,
    pub item_count: usize,
    pub used_volume: u64,
    pub free_volume: u64,
    pub utilization: f64,
}

// ---------------------------------------------------------------------------
// StowageEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct StowageEngine {
    registry: ContainerRegistry,
    items: ItemTable,
    log: RearrangementLog,
    config: EngineConfig,
}

impl StowageEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    pub fn items(&self) -> &ItemTable {
        &self.items
    }

    fn policy(&self) -> PlacementPolicy {
        PlacementPolicy::new(self.config.zone_preference)
    }

    // -- Registration --

    /// Register containers. Rejects zero dimensions and ids that repeat
    /// within the list or collide with a registered container.
    pub fn add_containers(&mut self, containers: Vec<Container>) -> Result<(), StowageError> {
        validation::validate_containers(&containers)?;
        if let Some(c) = containers
            .iter()
            .find(|c| self.registry.key_of(&c.id).is_some())
        {
            return Err(ValidationError::DuplicateId {
                kind: "container",
                id: c.id.to_string(),
            }
            .into());
        }
        for c in containers {
            log::debug!("container {} registered in zone {}", c.id, c.zone);
            self.registry.insert(c);
        }
        Ok(())
    }

    /// Register items without placing them. Known ids keep their first
    /// definition.
    pub fn add_items(&mut self, items: Vec<Item>) -> Result<Vec<ItemKey>, StowageError> {
        validation::validate_items(&items)?;
        Ok(items.into_iter().map(|i| self.items.insert(i)).collect())
    }

    // -- Packing --

    /// Place a batch. Items already placed are left where they are, so
    /// repeating a batch takes no new rearrangement steps.
    pub fn pack(&mut self, batch: Vec<Item>) -> Result<PackingOutcome, StowageError> {
        let keys = self.add_items(batch)?;
        let log_start = self.log.len();
        let mut unplaced = Vec::new();
        let mut evicted = Vec::new();

        let policy = self.policy();
        for key in policy.order(&self.items, &keys) {
            if self.registry.is_placed(key) {
                continue;
            }
            if let Err(reason) = self.place_one(policy, key, &mut evicted) {
                let item = self.item_id(key)?;
                log::warn!("item {item} left unplaced: {reason:?}");
                unplaced.push(Unplaced { item, reason });
            }
        }

        // Evicted items placed again later in the batch are no longer evicted.
        let mut seen = HashSet::new();
        evicted.retain(|&k| !self.registry.is_placed(k) && seen.insert(k));

        Ok(PackingOutcome {
            placements: self.placements(),
            rearrangements: self.log.since(log_start).to_vec(),
            unplaced,
            evicted: evicted
                .into_iter()
                .map(|k| self.item_id(k))
                .collect::<Result<_, _>>()?,
        })
    }

    fn place_one(
        &mut self,
        policy: PlacementPolicy,
        key: ItemKey,
        evicted: &mut Vec<ItemKey>,
    ) -> Result<(), UnplacedReason> {
        let items = &self.items;
        let item = items.get(key).ok_or(UnplacedReason::NoSpace)?;

        if let Some((ck, bounds)) = policy.place(&mut self.registry, key, item, None) {
            log::debug!("placed {} in {:?} at {:?}", item.id, ck, bounds.origin);
            return Ok(());
        }

        let target = policy
            .rearrangement_target(&self.registry, item)
            .ok_or(UnplacedReason::NoCapableContainer)?;
        if !self.config.rearrangement {
            return Err(UnplacedReason::NoSpace);
        }

        let mut rearranger = Rearranger::new(&mut self.registry, items, &mut self.log, policy)
            .cross_container_moves(self.config.cross_container_moves)
            .max_depth(self.config.max_rearrangement_depth);
        let result = rearranger.place(target, key);
        evicted.extend(rearranger.into_evicted());

        match result {
            Ok(bounds) => {
                log::debug!("placed {} after rearranging at {:?}", item.id, bounds.origin);
                Ok(())
            }
            Err(RearrangeError::RecursionLimitExceeded { .. }) => {
                Err(UnplacedReason::RecursionLimitExceeded)
            }
            Err(_) => Err(UnplacedReason::NoSpace),
        }
    }

    // -- Manual placement --

    /// Put a registered, unplaced item at `start` in a container. Falls back
    /// to the container's free space if `start` is out of bounds or taken.
    pub fn place_at(
        &mut self,
        item: &ItemId,
        container: &ContainerId,
        start: Position,
    ) -> Result<Placement, StowageError> {
        let key = self.item_key(item)?;
        let ck = self.container_key(container)?;
        if self.registry.is_placed(key) {
            return Err(StowageError::AlreadyPlaced(item.clone()));
        }
        let extent = self
            .items
            .get(key)
            .map(|i| i.extent)
            .ok_or_else(|| StowageError::ItemNotFound(item.clone()))?;

        let bounds = match self.registry.place_exact(ck, key, Cuboid::new(start, extent)) {
            Ok(()) => Cuboid::new(start, extent),
            Err(SpatialError::OutOfBounds | SpatialError::Occupied) => self
                .registry
                .try_place(ck, key, &extent)
                .ok_or_else(|| StowageError::NoSpace {
                    item: item.clone(),
                    container: container.clone(),
                })?,
            Err(_) => return Err(StowageError::ContainerNotFound(container.clone())),
        };
        Ok(Placement {
            item: item.clone(),
            container: container.clone(),
            start: bounds.origin,
            end: bounds.end(),
        })
    }

    /// Take an item out of its container. Returns where it was.
    pub fn remove_item(&mut self, item: &ItemId) -> Result<Placement, StowageError> {
        let key = self.item_key(item)?;
        let (ck, bounds) = self
            .registry
            .remove_item(key)
            .map_err(|_| StowageError::NotPlaced(item.clone()))?;
        log::debug!("removed {item}");
        Ok(Placement {
            item: item.clone(),
            container: self.container_id(ck)?,
            start: bounds.origin,
            end: bounds.end(),
        })
    }

    /// Remove every item from a container. Returns how many were removed.
    pub fn empty_container(&mut self, container: &ContainerId) -> Result<usize, StowageError> {
        let ck = self.container_key(container)?;
        let removed = self
            .registry
            .clear(ck)
            .map_err(|_| StowageError::ContainerNotFound(container.clone()))?;
        log::debug!("emptied {container}: {} item(s)", removed.len());
        Ok(removed.len())
    }

    // -- Queries --

    /// Current placement of every item, in registration order.
    pub fn placements(&self) -> Vec<Placement> {
        self.items
            .iter()
            .filter_map(|(key, item)| {
                let (ck, bounds) = self.registry.location(key)?;
                Some(Placement {
                    item: item.id.clone(),
                    container: self.container_id(ck).ok()?,
                    start: bounds.origin,
                    end: bounds.end(),
                })
            })
            .collect()
    }

    pub fn placement(&self, item: &ItemId) -> Option<Placement> {
        let key = self.items.key_of(item)?;
        let (ck, bounds) = self.registry.location(key)?;
        Some(Placement {
            item: item.clone(),
            container: self.container_id(ck).ok()?,
            start: bounds.origin,
            end: bounds.end(),
        })
    }

    /// Every rearrangement step taken by this engine.
    pub fn rearrangement_log(&self) -> &[RearrangementRecord] {
        self.log.records()
    }

    pub fn container_summaries(&self) -> Vec<ContainerSummary> {
        self.registry
            .iter()
            .map(|(_, s)| ContainerSummary {
                container: s.container().id.clone(),
                zone: s.container().zone.clone(),
                item_count: s.item_count(),
                used_volume: s.used_volume(),
                free_volume: s.free_volume(),
                utilization: s.utilization(),
            })
            .collect()
    }

    /// True if nothing stands between a placed item and its container's
    /// open face.
    pub fn is_accessible(&self, item: &ItemId) -> Result<bool, StowageError> {
        let (key, ck, bounds) = self.located(item)?;
        let state = self
            .registry
            .get(ck)
            .ok_or_else(|| StowageError::NotPlaced(item.clone()))?;
        Ok(access::is_accessible(state, &bounds.origin, &bounds.extent, Some(key)))
    }

    /// Items in front of a placed item, nearest the open face first.
    pub fn blocking_items(&self, item: &ItemId) -> Result<Vec<ItemId>, StowageError> {
        let (key, ck, _) = self.located(item)?;
        let state = self
            .registry
            .get(ck)
            .ok_or_else(|| StowageError::NotPlaced(item.clone()))?;
        access::blocking_items(state, key)
            .into_iter()
            .map(|p| self.item_id(p.item))
            .collect()
    }

    pub fn retrieval_steps(&self, item: &ItemId) -> Result<usize, StowageError> {
        Ok(self.blocking_items(item)?.len())
    }

    /// Plan how to take `item` out of `container`. Never mutates state.
    pub fn plan_retrieval(
        &self,
        container: &ContainerId,
        item: &ItemId,
        strategy: &dyn RetrievalStrategy,
    ) -> Result<Vec<RetrievalStep>, StowageError> {
        let ck = self.container_key(container)?;
        let key = self.item_key(item)?;
        let state = self
            .registry
            .get(ck)
            .ok_or_else(|| StowageError::ContainerNotFound(container.clone()))?;
        retrieval::plan(state, &self.items, key, strategy).ok_or_else(|| {
            StowageError::NotInContainer {
                item: item.clone(),
                container: container.clone(),
            }
        })
    }

    /// Geometric invariant violations across every container.
    pub fn check_invariants(&self) -> Vec<Violation> {
        validation::check_invariants(&self.registry)
    }

    // -- Lookup helpers --

    fn item_key(&self, id: &ItemId) -> Result<ItemKey, StowageError> {
        self.items
            .key_of(id)
            .ok_or_else(|| StowageError::ItemNotFound(id.clone()))
    }

    fn container_key(&self, id: &ContainerId) -> Result<ContainerKey, StowageError> {
        self.registry
            .key_of(id)
            .ok_or_else(|| StowageError::ContainerNotFound(id.clone()))
    }

    fn located(&self, id: &ItemId) -> Result<(ItemKey, ContainerKey, Cuboid), StowageError> {
        let key = self.item_key(id)?;
        let (ck, bounds) = self
            .registry
            .location(key)
            .ok_or_else(|| StowageError::NotPlaced(id.clone()))?;
        Ok((key, ck, bounds))
    }

    fn item_id(&self, key: ItemKey) -> Result<ItemId, StowageError> {
        self.items
            .id_of(key)
            .cloned()
            .ok_or(StowageError::UnknownKey)
    }

    fn container_id(&self, key: ContainerKey) -> Result<ContainerId, StowageError> {
        self.registry
            .get(key)
            .map(|s| s.container().id.clone())
            .ok_or(StowageError::UnknownKey)
    }
}
