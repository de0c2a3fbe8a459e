//! Read-only retrieval planning.
//!
//! A plan lists what an operator does to get an item out: take out and set
//! aside each blocking item, retrieve the target, then put the blockers back
//! in reverse order. Strategies only decide the order blockers come out in.

use crate::access;
use crate::container::{ContainerState, PlacedItem};
use crate::id::{ItemId, ItemKey};
use crate::item::ItemTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalAction {
    Remove,
    SetAside,
    Retrieve,
    PlaceBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalStep {
    /// 1-based position in the plan.
    pub step: usize,
    pub action: RetrievalAction,
    pub item: ItemId,
    pub item_name: String,
}

/// Orders the items blocking a retrieval.
pub trait RetrievalStrategy {
    fn name(&self) -> &str;

    /// Return `blockers` in the order they should be taken out.
    fn order(&self, target: &PlacedItem, blockers: Vec<PlacedItem>) -> Vec<PlacedItem>;
}

/// Clear blockers nearest the open face first.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontToBack;

impl RetrievalStrategy for FrontToBack {
    fn name(&self) -> &str {
        "front_to_back"
    }

    fn order(&self, _target: &PlacedItem, mut blockers: Vec<PlacedItem>) -> Vec<PlacedItem> {
        blockers.sort_by_key(|p| (p.bounds.origin.y, p.bounds.origin.order_key()));
        blockers
    }
}

/// Clear blockers closest to the target first (Manhattan distance between
/// origins), ties broken front to back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestFirst;

impl RetrievalStrategy for NearestFirst {
    fn name(&self) -> &str {
        "nearest_first"
    }

    fn order(&self, target: &PlacedItem, mut blockers: Vec<PlacedItem>) -> Vec<PlacedItem> {
        let t = target.bounds.origin;
        blockers.sort_by_key(|p| {
            let o = p.bounds.origin;
            let distance = o.x.abs_diff(t.x) as u64 + o.y.abs_diff(t.y) as u64 + o.z.abs_diff(t.z) as u64;
            (distance, o.y, o.order_key())
        });
        blockers
    }
}

/// Plan the retrieval of `item` from `state`, or `None` if it is not there.
pub fn plan(
    state: &ContainerState,
    items: &ItemTable,
    item: ItemKey,
    strategy: &dyn RetrievalStrategy,
) -> Option<Vec<RetrievalStep>> {
    let bounds = state.bounds_of(item)?;
    let target = PlacedItem { item, bounds };
    let blockers = strategy.order(&target, access::blocking_items(state, item));

    let mut steps = Vec::with_capacity(blockers.len() * 3 + 1);
    let mut push = |action: RetrievalAction, key: ItemKey| {
        if let Some(it) = items.get(key) {
            steps.push(RetrievalStep {
                step: steps.len() + 1,
                action,
                item: it.id.clone(),
                item_name: it.name.clone(),
            });
        }
    };

    for b in &blockers {
        push(RetrievalAction::Remove, b.item);
        push(RetrievalAction::SetAside, b.item);
    }
    push(RetrievalAction::Retrieve, item);
    for b in blockers.iter().rev() {
        push(RetrievalAction::PlaceBack, b.item);
    }

    log::debug!(
        "retrieval plan for {:?} ({}): {} step(s)",
        items.id_of(item),
        strategy.name(),
        steps.len()
    );
    Some(steps)
}
