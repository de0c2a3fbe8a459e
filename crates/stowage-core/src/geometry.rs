//! Axis-aligned geometry primitives for containers, items and free space.
//!
//! Axis convention: `x` runs along the container width, `y` along its depth
//! (`y == 0` is the open access face) and `z` along its height.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A corner position inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0, z: 0 };

    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Sort key used wherever geometry ties must break deterministically:
    /// lowest first, then nearest the access face, then leftmost.
    pub fn order_key(&self) -> (u32, u32, u32) {
        (self.z, self.y, self.x)
    }
}

/// Width/depth/height of an item, container or free region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub depth: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, depth: u32, height: u32) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    /// Volume of a validated extent. Validation rejects extents for which
    /// [`Extent::checked_volume`] is `None`.
    pub fn volume(&self) -> u64 {
        self.width as u64 * self.depth as u64 * self.height as u64
    }

    /// Volume, or `None` if it does not fit in `u64`.
    pub fn checked_volume(&self) -> Option<u64> {
        (self.width as u64)
            .checked_mul(self.depth as u64)?
            .checked_mul(self.height as u64)
    }

    /// True if any axis is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.depth == 0 || self.height == 0
    }

    /// True if `self` is no larger than `other` on every axis.
    pub fn fits_within(&self, other: &Extent) -> bool {
        self.width <= other.width && self.depth <= other.depth && self.height <= other.height
    }
}

/// An axis-aligned box: origin corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cuboid {
    pub origin: Position,
    pub extent: Extent,
}

impl Cuboid {
    pub fn new(origin: Position, extent: Extent) -> Self {
        Self { origin, extent }
    }

    /// A box anchored at the container origin.
    pub fn at_origin(extent: Extent) -> Self {
        Self::new(Position::ORIGIN, extent)
    }

    /// The corner opposite the origin (exclusive bound). Only meaningful for
    /// boxes inside a container; see [`Cuboid::checked_end`].
    pub fn end(&self) -> Position {
        Position::new(
            self.origin.x + self.extent.width,
            self.origin.y + self.extent.depth,
            self.origin.z + self.extent.height,
        )
    }

    /// The far corner, or `None` if it lies past `u32::MAX` on some axis.
    pub fn checked_end(&self) -> Option<Position> {
        Some(Position::new(
            self.origin.x.checked_add(self.extent.width)?,
            self.origin.y.checked_add(self.extent.depth)?,
            self.origin.z.checked_add(self.extent.height)?,
        ))
    }

    /// Top face height.
    pub fn top(&self) -> u32 {
        self.origin.z + self.extent.height
    }

    pub fn volume(&self) -> u64 {
        self.extent.volume()
    }

    /// True if an item of `extent` fits in this box at its origin.
    pub fn fits(&self, extent: &Extent) -> bool {
        extent.fits_within(&self.extent)
    }

    /// Strict overlap on all three axes. Touching faces do not intersect.
    pub fn intersects(&self, other: &Cuboid) -> bool {
        self.overlaps_x(other) && self.overlaps_y(other) && self.overlaps_z(other)
    }

    /// True if `other` lies entirely inside `self`.
    /// Works for any pair of boxes, including ones whose far corner lies
    /// past `u32::MAX`.
    pub fn contains(&self, other: &Cuboid) -> bool {
        let (a, b) = (self.wide_end(), other.wide_end());
        other.origin.x >= self.origin.x
            && other.origin.y >= self.origin.y
            && other.origin.z >= self.origin.z
            && b.iter().zip(a).all(|(b, a)| *b <= a)
    }

    fn wide_end(&self) -> [u64; 3] {
        [
            self.origin.x as u64 + self.extent.width as u64,
            self.origin.y as u64 + self.extent.depth as u64,
            self.origin.z as u64 + self.extent.height as u64,
        ]
    }

    pub fn overlaps_x(&self, other: &Cuboid) -> bool {
        spans_overlap(self.origin.x, self.extent.width, other.origin.x, other.extent.width)
    }

    pub fn overlaps_y(&self, other: &Cuboid) -> bool {
        spans_overlap(self.origin.y, self.extent.depth, other.origin.y, other.extent.depth)
    }

    pub fn overlaps_z(&self, other: &Cuboid) -> bool {
        spans_overlap(self.origin.z, self.extent.height, other.origin.z, other.extent.height)
    }

    /// The same box moved `dz` units up, or `None` on coordinate overflow.
    pub fn raised(&self, dz: u32) -> Option<Cuboid> {
        let z = self.origin.z.checked_add(dz)?;
        z.checked_add(self.extent.height)?;
        Some(Cuboid::new(
            Position::new(self.origin.x, self.origin.y, z),
            self.extent,
        ))
    }

    /// Cover `self \ other` with up to six maximal slabs.
    ///
    /// The slabs may overlap each other but none overlaps `other`. Returns
    /// `self` unchanged when the two boxes do not intersect.
    pub fn subtract(&self, other: &Cuboid) -> Vec<Cuboid> {
        if !self.intersects(other) {
            return vec![*self];
        }

        let (s0, s1) = (self.origin, self.end());
        let (o0, o1) = (other.origin, other.end());
        let full = self.extent;
        let mut pieces = Vec::with_capacity(6);

        if o0.x > s0.x {
            pieces.push(Cuboid::new(s0, Extent::new(o0.x - s0.x, full.depth, full.height)));
        }
        if o1.x < s1.x {
            pieces.push(Cuboid::new(
                Position::new(o1.x, s0.y, s0.z),
                Extent::new(s1.x - o1.x, full.depth, full.height),
            ));
        }
        if o0.y > s0.y {
            pieces.push(Cuboid::new(s0, Extent::new(full.width, o0.y - s0.y, full.height)));
        }
        if o1.y < s1.y {
            pieces.push(Cuboid::new(
                Position::new(s0.x, o1.y, s0.z),
                Extent::new(full.width, s1.y - o1.y, full.height),
            ));
        }
        if o0.z > s0.z {
            pieces.push(Cuboid::new(s0, Extent::new(full.width, full.depth, o0.z - s0.z)));
        }
        if o1.z < s1.z {
            pieces.push(Cuboid::new(
                Position::new(s0.x, s0.y, o1.z),
                Extent::new(full.width, full.depth, s1.z - o1.z),
            ));
        }

        pieces
    }
}

/// Half-open span overlap: `[a, a + alen)` against `[b, b + blen)`.
#[inline]
pub fn spans_overlap(a: u32, alen: u32, b: u32, blen: u32) -> bool {
    (a as u64) < b as u64 + blen as u64 && (b as u64) < a as u64 + alen as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: u32, y: u32, z: u32, w: u32, d: u32, h: u32) -> Cuboid {
        Cuboid::new(Position::new(x, y, z), Extent::new(w, d, h))
    }

    #[test]
    fn end_is_origin_plus_extent() {
        let c = cube(1, 2, 3, 10, 20, 30);
        assert_eq!(c.end(), Position::new(11, 22, 33));
        assert_eq!(c.top(), 33);
        assert_eq!(c.volume(), 6000);
    }

    #[test]
    fn touching_faces_do_not_intersect() {
        let a = cube(0, 0, 0, 10, 10, 10);
        let b = cube(10, 0, 0, 10, 10, 10);
        let c = cube(0, 0, 10, 10, 10, 10);
        assert!(!a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn partial_overlap_intersects() {
        let a = cube(0, 0, 0, 10, 10, 10);
        let b = cube(9, 9, 9, 5, 5, 5);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn containment() {
        let outer = cube(0, 0, 0, 10, 10, 10);
        let inner = cube(2, 2, 2, 3, 3, 3);
        let poking = cube(8, 8, 8, 3, 3, 3);
        assert!(outer.contains(&inner));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&poking));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn containment_survives_coordinate_overflow() {
        let outer = cube(0, 0, 0, 10, 10, 10);
        let far = cube(u32::MAX, 0, 0, 10, 10, 10);
        assert!(far.checked_end().is_none());
        assert!(!outer.contains(&far));
        assert_eq!(outer.checked_end(), Some(Position::new(10, 10, 10)));
    }

    #[test]
    fn volume_overflow_is_detected() {
        assert_eq!(Extent::new(10, 20, 30).checked_volume(), Some(6000));
        assert_eq!(Extent::new(3_000_000, 3_000_000, 3_000_000).checked_volume(), None);
        assert!(Extent::new(u32::MAX, u32::MAX, 1).checked_volume().is_some());
    }

    #[test]
    fn fits_checks_every_axis() {
        let space = cube(0, 0, 0, 10, 5, 20);
        assert!(space.fits(&Extent::new(10, 5, 20)));
        assert!(!space.fits(&Extent::new(11, 5, 20)));
        assert!(!space.fits(&Extent::new(10, 6, 1)));
    }

    #[test]
    fn raised_moves_only_z() {
        let c = cube(1, 2, 3, 4, 5, 6);
        let up = c.raised(10).unwrap();
        assert_eq!(up.origin, Position::new(1, 2, 13));
        assert_eq!(up.extent, c.extent);
        assert!(cube(0, 0, u32::MAX - 1, 1, 1, 1).raised(5).is_none());
    }

    #[test]
    fn subtract_disjoint_is_identity() {
        let a = cube(0, 0, 0, 10, 10, 10);
        let b = cube(20, 20, 20, 1, 1, 1);
        assert_eq!(a.subtract(&b), vec![a]);
    }

    #[test]
    fn subtract_center_yields_six_slabs() {
        let a = cube(0, 0, 0, 10, 10, 10);
        let hole = cube(4, 4, 4, 2, 2, 2);
        let pieces = a.subtract(&hole);
        assert_eq!(pieces.len(), 6);
        for p in &pieces {
            assert!(!p.intersects(&hole));
            assert!(a.contains(p));
        }
    }

    #[test]
    fn subtract_covering_box_leaves_nothing() {
        let a = cube(2, 2, 2, 3, 3, 3);
        let cover = cube(0, 0, 0, 10, 10, 10);
        assert!(a.subtract(&cover).is_empty());
    }

    #[test]
    fn subtract_bottom_half_keeps_top() {
        let a = cube(0, 0, 0, 10, 10, 10);
        let bottom = cube(0, 0, 0, 10, 10, 4);
        assert_eq!(a.subtract(&bottom), vec![cube(0, 0, 4, 10, 10, 6)]);
    }

    #[test]
    fn span_overlap_half_open() {
        assert!(spans_overlap(0, 10, 9, 1));
        assert!(!spans_overlap(0, 10, 10, 1));
        assert!(!spans_overlap(10, 1, 0, 10));
    }
}
