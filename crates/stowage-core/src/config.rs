use serde::{Deserialize, Serialize};

/// Tunables for a [`crate::engine::StowageEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Try containers in the item's preferred zone before the rest.
    pub zone_preference: bool,
    /// Run the rearrangement cascade when an item fits nowhere.
    pub rearrangement: bool,
    /// Allow blockers to be moved into other containers.
    pub cross_container_moves: bool,
    /// Per-cascade step bound. Defaults to the target container's item
    /// count plus one.
    pub max_rearrangement_depth: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zone_preference: true,
            rearrangement: true,
            cross_container_moves: true,
            max_rearrangement_depth: None,
        }
    }
}
