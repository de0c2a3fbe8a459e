//! Loading pipeline: finds request files, deserializes them, and converts the
//! data into core containers, items and engine configuration.
//!
//! A batch directory holds `containers.*` and `items.*` (required) and
//! `engine.*` (optional), each in RON, JSON, or TOML.

use crate::schema::{ContainerData, ItemData, PackingRequest, PackingResponse};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use stowage_core::config::EngineConfig;
use stowage_core::container::Container;
use stowage_core::engine::{StowageEngine, StowageError};
use stowage_core::geometry::Extent;
use stowage_core::item::Item;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("no {file}.ron, {file}.toml or {file}.json in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("{file} is not a .ron, .toml or .json file")]
    UnsupportedFormat { file: PathBuf },

    #[error("both {a} and {b} exist; keep one")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("cannot parse {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A dimension is not a positive, finite number that fits in `u32`, or
    /// the box volume overflows.
    #[error("{kind} '{id}' has invalid dimensions in {file}")]
    InvalidDimensions {
        file: PathBuf,
        kind: &'static str,
        id: String,
    },

    #[error(transparent)]
    Engine(#[from] StowageError),

    #[error("cannot serialize response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Formats and file discovery
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    /// Lookup order when scanning a batch directory.
    const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

/// The `base_name` file in `dir`, whichever format it is written in.
/// Two formats side by side are ambiguous and rejected.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = Format::ALL
        .into_iter()
        .map(|f| dir.join(format!("{base_name}.{}", f.extension())))
        .filter(|p| p.exists());

    match (present.next(), present.next()) {
        (Some(a), Some(b)) => Err(DataLoadError::ConflictingFormats { a, b }),
        (found, _) => Ok(found),
    }
}

pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Read a list of records. A TOML document cannot be a bare array, so there
/// the list lives under `toml_key` (`[[containers]]`, `[[items]]`).
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let mut table: toml::Table = deserialize_file(path)?;
    table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("no `{toml_key}` array")))?
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Conversion
// ===========================================================================

/// Convert one file dimension. Fractional sizes round up: an item needs at
/// least the space it measures.
fn dimension(v: f64) -> Option<u32> {
    if !v.is_finite() || v <= 0.0 {
        return None;
    }
    let rounded = v.ceil();
    (rounded <= u32::MAX as f64).then_some(rounded as u32)
}

fn extent(w: f64, d: f64, h: f64) -> Option<Extent> {
    let extent = Extent::new(dimension(w)?, dimension(d)?, dimension(h)?);
    extent.checked_volume().map(|_| extent)
}

pub fn to_container(data: &ContainerData, file: &Path) -> Result<Container, DataLoadError> {
    let extent = extent(data.width, data.depth, data.height).ok_or_else(|| {
        DataLoadError::InvalidDimensions {
            file: file.to_path_buf(),
            kind: "container",
            id: data.id.clone(),
        }
    })?;
    Ok(Container::new(data.id.clone(), data.zone.clone(), extent))
}

pub fn to_item(data: &ItemData, file: &Path) -> Result<Item, DataLoadError> {
    let extent = extent(data.width, data.depth, data.height).ok_or_else(|| {
        DataLoadError::InvalidDimensions {
            file: file.to_path_buf(),
            kind: "item",
            id: data.id.clone(),
        }
    })?;
    let mut item = Item::new(data.id.clone(), data.name.clone(), extent)
        .with_priority(data.priority_score)
        .with_zone(data.preferred_zone.clone());
    // The HTTP API sends "N/A" for items that never expire.
    item.meta.expiry_date = data
        .expiry_date
        .clone()
        .filter(|d| !d.is_empty() && d != "N/A");
    item.meta.usage_limit = data
        .usage_limit
        .filter(|u| u.is_finite() && *u >= 0.0)
        .map(|u| u as u32);
    item.meta.mass = data.mass;
    Ok(item)
}

// ===========================================================================
// Batch loading
// ===========================================================================

/// Everything needed to run one packing call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub config: EngineConfig,
    pub containers: Vec<Container>,
    pub items: Vec<Item>,
}

/// Load a batch from a directory.
pub fn load_batch(dir: &Path) -> Result<Batch, DataLoadError> {
    let config = match find_data_file(dir, "engine")? {
        Some(path) => deserialize_file(&path)?,
        None => EngineConfig::default(),
    };

    let containers_path = require_data_file(dir, "containers")?;
    let containers = deserialize_list::<ContainerData>(&containers_path, "containers")?
        .iter()
        .map(|c| to_container(c, &containers_path))
        .collect::<Result<Vec<_>, _>>()?;

    let items_path = require_data_file(dir, "items")?;
    let items = deserialize_list::<ItemData>(&items_path, "items")?
        .iter()
        .map(|i| to_item(i, &items_path))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "loaded {} container(s) and {} item(s) from {}",
        containers.len(),
        items.len(),
        dir.display()
    );
    Ok(Batch {
        config,
        containers,
        items,
    })
}

/// Load a single-file request (`{containers, items}`).
pub fn load_request(path: &Path) -> Result<Batch, DataLoadError> {
    let request: PackingRequest = deserialize_file(path)?;
    let containers = request
        .containers
        .iter()
        .map(|c| to_container(c, path))
        .collect::<Result<Vec<_>, _>>()?;
    let items = request
        .items
        .iter()
        .map(|i| to_item(i, path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Batch {
        config: EngineConfig::default(),
        containers,
        items,
    })
}

/// Run a batch through a fresh engine and build the response body.
pub fn pack_request(batch: Batch) -> Result<PackingResponse, DataLoadError> {
    let mut engine = StowageEngine::new(batch.config);
    engine.add_containers(batch.containers)?;
    let outcome = engine.pack(batch.items)?;
    Ok(PackingResponse::from(&outcome))
}

/// Serialize a response as pretty-printed JSON.
pub fn response_json(response: &PackingResponse) -> Result<String, DataLoadError> {
    Ok(serde_json::to_string_pretty(response)?)
}

// ===========================================================================
// Tests
// ===========================================================================
