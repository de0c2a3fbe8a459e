//! Free-space tracking for a single container.
//!
//! The index holds candidate empty boxes. Boxes may overlap one another, but
//! none overlaps an item placed in the owning container, so any box that fits
//! an item can take it without a collision check.

use crate::geometry::{Cuboid, Extent, Position};
use std::cmp::Ordering;

#[derive(Debug, Clone, Default)]
pub struct FreeSpaceIndex {
    spaces: Vec<Cuboid>,
}

impl FreeSpaceIndex {
    /// An index for an empty container: one space covering everything.
    pub fn new(bounds: Extent) -> Self {
        Self {
            spaces: vec![Cuboid::at_origin(bounds)],
        }
    }

    pub fn spaces(&self) -> &[Cuboid] {
        &self.spaces
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Sort the index so the best candidate for `extent` comes first.
    pub fn rank(&mut self, extent: &Extent) {
        self.spaces.sort_by(|a, b| compare_spaces(a, b, extent));
    }

    /// The best-fitting space for `extent`, without mutating the index.
    pub fn best_fit(&self, extent: &Extent) -> Option<&Cuboid> {
        self.spaces
            .iter()
            .filter(|s| s.fits(extent))
            .min_by(|a, b| compare_spaces(a, b, extent))
    }

    /// Place an item of `extent` in the best-fitting space.
    ///
    /// Returns the item's origin, or `None` if no single space is large
    /// enough. On success the consumed space is split and the index merged.
    pub fn try_place(&mut self, extent: &Extent) -> Option<Position> {
        self.rank(extent);
        let space = *self.spaces.first().filter(|s| s.fits(extent))?;
        self.spaces.remove(0);

        let remainders = guillotine_split(&space, extent);
        log::trace!(
            "free space {:?} consumed by {:?}, {} remainder(s)",
            space,
            extent,
            remainders.len()
        );
        // Other spaces may overlap the consumed one; carve the item out of them.
        let placed = Cuboid::new(space.origin, *extent);
        self.spaces = self
            .spaces
            .iter()
            .flat_map(|s| s.subtract(&placed))
            .chain(remainders)
            .collect();
        self.merge();

        Some(space.origin)
    }

    /// Return a vacated box to the index.
    pub fn release(&mut self, region: Cuboid) {
        log::trace!("free space released: {:?}", region);
        self.spaces.push(region);
        self.merge();
    }

    /// Carve `region` out of every overlapping space.
    pub fn occupy(&mut self, region: &Cuboid) {
        if !self.spaces.iter().any(|s| s.intersects(region)) {
            return;
        }
        log::trace!("free space carved by {:?}", region);
        self.spaces = self
            .spaces
            .iter()
            .flat_map(|s| s.subtract(region))
            .collect();
        self.merge();
    }

    /// Drop every space fully contained in another, keeping the larger.
    pub fn merge(&mut self) {
        self.spaces.sort_by(|a, b| {
            b.volume()
                .cmp(&a.volume())
                .then_with(|| a.origin.order_key().cmp(&b.origin.order_key()))
        });

        let mut kept: Vec<Cuboid> = Vec::with_capacity(self.spaces.len());
        for space in self.spaces.drain(..) {
            if !kept.iter().any(|k| k.contains(&space)) {
                kept.push(space);
            }
        }
        self.spaces = kept;
    }
}

/// Candidate ranking. Fitting spaces first, least waste first; among spaces
/// that do not fit, larger first. Origin breaks remaining ties.
fn compare_spaces(a: &Cuboid, b: &Cuboid, extent: &Extent) -> Ordering {
    let item_volume = extent.volume();
    let by_origin = || a.origin.order_key().cmp(&b.origin.order_key());
    match (a.fits(extent), b.fits(extent)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => (a.volume() - item_volume)
            .cmp(&(b.volume() - item_volume))
            .then_with(by_origin),
        (false, false) => b.volume().cmp(&a.volume()).then_with(by_origin),
    }
}

/// Split `space` after an item of `extent` is placed at its origin.
///
/// Produces up to three disjoint remainders: above the item (full footprint),
/// beside it along x (item height), and in front of it along y (item width
/// and height).
pub fn guillotine_split(space: &Cuboid, extent: &Extent) -> Vec<Cuboid> {
    let o = space.origin;
    let s = space.extent;
    let mut out = Vec::with_capacity(3);

    if s.height > extent.height {
        out.push(Cuboid::new(
            Position::new(o.x, o.y, o.z + extent.height),
            Extent::new(s.width, s.depth, s.height - extent.height),
        ));
    }
    if s.width > extent.width {
        out.push(Cuboid::new(
            Position::new(o.x + extent.width, o.y, o.z),
            Extent::new(s.width - extent.width, s.depth, extent.height),
        ));
    }
    if s.depth > extent.depth {
        out.push(Cuboid::new(
            Position::new(o.x, o.y + extent.depth, o.z),
            Extent::new(extent.width, s.depth - extent.depth, extent.height),
        ));
    }

    out
}
