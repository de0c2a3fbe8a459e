//! Stowage Core -- spatial placement and rearrangement for storage
//! containers.
//!
//! Items (axis-aligned boxes) are packed into containers grouped by zone.
//! When an item fits nowhere, blocking items are shifted, moved to another
//! container, or removed until it does, and every such step is logged.
//!
//! # Axes
//!
//! `x` is width, `y` is depth and `z` is height. `y == 0` is a container's
//! open face; items nearer it are reached first.
//!
//! # Key Types
//!
//! - [`engine::StowageEngine`] -- Owns all state and runs packing, manual
//!   placement and queries.
//! - [`free_space::FreeSpaceIndex`] -- Candidate empty boxes per container
//!   with best-fit search, guillotine splitting and containment merging.
//! - [`policy::PlacementPolicy`] -- Batch ordering and container choice.
//! - [`rearrange::Rearranger`] -- The shift / move / remove cascade and its
//!   append-only [`rearrange::RearrangementLog`].
//! - [`access`] -- Occlusion along the depth axis.
//! - [`retrieval::RetrievalStrategy`] -- Pluggable retrieval planning.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point priority scores.

pub mod access;
pub mod config;
pub mod container;
pub mod engine;
pub mod fixed;
pub mod free_space;
pub mod geometry;
pub mod id;
pub mod item;
pub mod policy;
pub mod rearrange;
pub mod retrieval;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
