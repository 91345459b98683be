//! Sparse region → cell → overlap-area container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WindClassError};
use crate::grid::{CellId, GridShape};

/// Stable region code, e.g. a NUTS identifier.
pub type RegionId = String;

/// Overlap areas keyed by region, then cell.
///
/// Only pairs that geometrically intersect are present; absent pairs are
/// implicitly zero. Iteration order is deterministic (sorted by key).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaIndex {
    regions: BTreeMap<RegionId, BTreeMap<CellId, f64>>,
}

/// An [`AreaIndex`] together with the shape of the grid its cell ids refer
/// to, as stored between the overlap and classification stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedAreas {
    pub grid: GridShape,
    pub areas: AreaIndex,
}

impl AreaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the overlap of `cell` with `region`, accumulating if the pair
    /// already exists (multi-part regions report one area per part).
    pub fn insert(&mut self, region: &str, cell: CellId, area: f64) -> Result<()> {
        if !(area >= 0.0) {
            return Err(WindClassError::NegativeArea {
                region: region.to_string(),
                cell,
                area,
            });
        }
        let cells = match self.regions.get_mut(region) {
            Some(cells) => cells,
            None => self.regions.entry(region.to_string()).or_default(),
        };
        *cells.entry(cell).or_insert(0.0) += area;
        Ok(())
    }

    pub fn get(&self, region: &str, cell: CellId) -> Option<f64> {
        self.regions.get(region).and_then(|cells| cells.get(&cell)).copied()
    }

    /// Cells overlapping `region`, or `None` if the region has no entries.
    pub fn cells(&self, region: &str) -> Option<&BTreeMap<CellId, f64>> {
        self.regions.get(region)
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionId> {
        self.regions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionId, &BTreeMap<CellId, f64>)> {
        self.regions.iter()
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Sum of all overlap areas for a region (0 if absent).
    pub fn region_area(&self, region: &str) -> f64 {
        self.regions
            .get(region)
            .map(|cells| cells.values().sum())
            .unwrap_or(0.0)
    }

    /// Sorted union of cell ids over all regions.
    pub fn all_cells(&self) -> Vec<CellId> {
        let mut ids: Vec<CellId> = self
            .regions
            .values()
            .flat_map(|cells| cells.keys().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
