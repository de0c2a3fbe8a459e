//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::container::Container;
use crate::engine::{PackingOutcome, StowageEngine};
use crate::geometry::{Cuboid, Extent};
use crate::item::Item;

// ===========================================================================
// Builders
// ===========================================================================

pub fn container(id: &str, zone: &str, w: u32, d: u32, h: u32) -> Container {
    Container::new(id, zone, Extent::new(w, d, h))
}

pub fn item(id: &str, zone: &str, w: u32, d: u32, h: u32, priority: f64) -> Item {
    Item::new(id, format!("Item {id}"), Extent::new(w, d, h))
        .with_zone(zone)
        .with_priority(priority)
}

/// An engine with default configuration and the given containers.
pub fn engine_with(containers: Vec<Container>) -> StowageEngine {
    let mut engine = StowageEngine::default();
    engine
        .add_containers(containers)
        .expect("test containers are valid");
    engine
}

/// `count` items with sizes cycling through a small fixed palette.
pub fn mixed_batch(count: usize, zone: &str) -> Vec<Item> {
    const SIZES: [(u32, u32, u32); 5] = [(10, 10, 20), (15, 10, 10), (5, 5, 5), (20, 20, 10), (8, 12, 6)];
    (0..count)
        .map(|i| {
            let (w, d, h) = SIZES[i % SIZES.len()];
            item(&format!("item-{i:04}"), zone, w, d, h, (i % 100) as f64)
        })
        .collect()
}

// ===========================================================================
// Assertions
// ===========================================================================

/// Panic if any two placements in the same container overlap.
pub fn assert_no_overlap(outcome: &PackingOutcome) {
    let boxes: Vec<_> = outcome
        .placements
        .iter()
        .map(|p| {
            let extent = Extent::new(p.end.x - p.start.x, p.end.y - p.start.y, p.end.z - p.start.z);
            (&p.container, &p.item, Cuboid::new(p.start, extent))
        })
        .collect();
    for (i, (ca, ia, a)) in boxes.iter().enumerate() {
        for (cb, ib, b) in &boxes[i + 1..] {
            assert!(
                ca != cb || !a.intersects(b),
                "{ia} and {ib} overlap in {ca}"
            );
        }
    }
}

/// Panic if the engine reports any invariant violation.
pub fn assert_consistent(engine: &StowageEngine) {
    let violations = engine.check_invariants();
    assert!(violations.is_empty(), "invariant violations: {violations:?}");
}
