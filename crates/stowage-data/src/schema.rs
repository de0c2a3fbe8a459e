//! Serde structs for request and response files.
//!
//! Requests are read from RON, JSON, or TOML and converted into core types by
//! the loader. Field names are camelCase; the `item*`-prefixed names used by
//! the stowage HTTP API are accepted as aliases.

use serde::{Deserialize, Serialize};
use stowage_core::engine::{PackingOutcome, Placement, Unplaced, UnplacedReason};
use stowage_core::geometry::Position;
use stowage_core::rearrange::{RearrangementAction, RearrangementRecord};

// ===========================================================================
// Request
// ===========================================================================

/// A container definition in a data file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerData {
    #[serde(alias = "containerId")]
    pub id: String,
    pub zone: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

/// An item definition in a data file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemData {
    #[serde(alias = "itemId")]
    pub id: String,
    #[serde(default, alias = "itemName")]
    pub name: String,
    #[serde(alias = "itemWidth")]
    pub width: f64,
    #[serde(alias = "itemDepth")]
    pub depth: f64,
    #[serde(alias = "itemHeight")]
    pub height: f64,
    #[serde(default, alias = "itemPriority", alias = "priority")]
    pub priority_score: f64,
    #[serde(default, alias = "itemPreferredZone")]
    pub preferred_zone: String,
    #[serde(default, alias = "itemExpiryDate")]
    pub expiry_date: Option<String>,
    #[serde(default, alias = "itemUsageLimit")]
    pub usage_limit: Option<f64>,
    #[serde(default)]
    pub mass: Option<f64>,
}

/// A whole packing request in one file.
#[derive(Debug, Clone, Deserialize)]
pub struct PackingRequest {
    pub containers: Vec<ContainerData>,
    pub items: Vec<ItemData>,
}

// ===========================================================================
// Response
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementData {
    pub item_id: String,
    pub container_id: String,
    pub start: Position,
    pub end: Position,
}

impl From<&Placement> for PlacementData {
    fn from(p: &Placement) -> Self {
        Self {
            item_id: p.item.to_string(),
            container_id: p.container.to_string(),
            start: p.start,
            end: p.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RearrangementData {
    pub step: u64,
    pub action: RearrangementAction,
    pub item_id: String,
    pub from_container_id: String,
    pub from_start: Position,
    pub from_end: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_start: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_end: Option<Position>,
}

impl From<&RearrangementRecord> for RearrangementData {
    fn from(r: &RearrangementRecord) -> Self {
        Self {
            step: r.step,
            action: r.action,
            item_id: r.item.to_string(),
            from_container_id: r.from.container.to_string(),
            from_start: r.from.start,
            from_end: r.from.end,
            to_container_id: r.to.as_ref().map(|t| t.container.to_string()),
            to_start: r.to.as_ref().map(|t| t.start),
            to_end: r.to.as_ref().map(|t| t.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplacedData {
    pub item_id: String,
    pub reason: UnplacedReason,
}

impl From<&Unplaced> for UnplacedData {
    fn from(u: &Unplaced) -> Self {
        Self {
            item_id: u.item.to_string(),
            reason: u.reason,
        }
    }
}

/// The response body for a packing request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackingResponse {
    pub success: bool,
    pub placements: Vec<PlacementData>,
    pub rearrangements: Vec<RearrangementData>,
    pub unplaced: Vec<UnplacedData>,
    pub evicted: Vec<String>,
}

impl From<&PackingOutcome> for PackingResponse {
    fn from(outcome: &PackingOutcome) -> Self {
        Self {
            success: true,
            placements: outcome.placements.iter().map(PlacementData::from).collect(),
            rearrangements: outcome
                .rearrangements
                .iter()
                .map(RearrangementData::from)
                .collect(),
            unplaced: outcome.unplaced.iter().map(UnplacedData::from).collect(),
            evicted: outcome.evicted.iter().map(|id| id.to_string()).collect(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
