//! Intersection calculator: region × grid-cell overlap areas.
//!
//! Cells are indexed by envelope in the grid's own reference system and each
//! region selects candidates there. Candidates and regions are then brought
//! into one equal-area projection for the exact intersection areas. The
//! result is a sparse [`AreaIndex`]; any transform failure aborts the whole
//! call.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use geo::{coord, BoundingRect, LineString, MultiPolygon, Polygon, Rect};

use crate::area_index::{AreaIndex, RegionId};
use crate::error::{Result, WindClassError};
use crate::grid::{CellId, Grid};
use crate::spatial::{to_multi, EnvelopeIndex, SpatialEngine, Srid};

/// Points per envelope edge when framing a region in the grid's system.
const FRAME_SEGMENTS: usize = 16;
/// Relative padding of the search frame.
const FRAME_MARGIN: f64 = 0.01;

/// An administrative region with its footprint.
#[derive(Debug, Clone)]
pub struct Region {
    pub code: RegionId,
    /// Administrative level (e.g. NUTS level 0..3).
    pub level: u8,
    pub srid: Srid,
    pub geometry: MultiPolygon<f64>,
}

/// Projections used by one overlap computation.
#[derive(Debug, Clone, Copy)]
pub struct OverlapProjections {
    /// Projection in which areas are measured.
    pub area_srid: Srid,
    /// Projection the grid coordinates are expressed in.
    pub grid_srid: Srid,
}

impl Default for OverlapProjections {
    fn default() -> Self {
        Self {
            area_srid: Srid::EtrsLaea,
            grid_srid: Srid::Wgs84,
        }
    }
}

/// Select regions by administrative level.
pub fn level_filter(level: u8) -> impl Fn(&Region) -> bool {
    move |r| r.level == level
}

/// Overlap areas between filtered regions and the cells of `grid`.
pub fn compute_overlaps<E, F>(
    engine: &E,
    regions: &[Region],
    filter: F,
    grid: &Grid,
    proj: OverlapProjections,
) -> Result<AreaIndex>
where
    E: SpatialEngine,
    F: Fn(&Region) -> bool,
{
    compute_cell_overlaps(engine, regions, filter, grid.polygons(), proj)
}

/// Same as [`compute_overlaps`] for arbitrary cell footprints in `proj.grid_srid`.
///
/// Candidate cells are selected in the grid's own reference system, using
/// each region's outline transformed there; only candidates are projected
/// into `proj.area_srid`. Any failed transform aborts the call with no
/// partial result.
pub fn compute_cell_overlaps<E, F>(
    engine: &E,
    regions: &[Region],
    filter: F,
    cells: Vec<(CellId, Polygon<f64>)>,
    proj: OverlapProjections,
) -> Result<AreaIndex>
where
    E: SpatialEngine,
    F: Fn(&Region) -> bool,
{
    let selected: Vec<&Region> = regions.iter().filter(|r| filter(r)).collect();
    tracing::info!(
        regions = selected.len(),
        cells = cells.len(),
        area_srid = %proj.area_srid,
        "calculating grid/region intersections"
    );

    // Regions go into both systems up front so a bad region fails early.
    let mut framed_regions: Vec<(&RegionId, Option<Rect<f64>>, MultiPolygon<f64>)> =
        Vec::with_capacity(selected.len());
    for r in &selected {
        let context = |e: WindClassError| with_context(e, format!("region {}", r.code));
        let frame = search_frame(engine, r, proj.grid_srid).map_err(context)?;
        let measured = engine.transform(&r.geometry, r.srid, proj.area_srid).map_err(context)?;
        framed_regions.push((&r.code, frame, measured));
    }

    let mut cells = cells;
    cells.sort_by_key(|(id, _)| *id);
    let index = EnvelopeIndex::build(cells.iter().map(|(id, p)| (*id, p)));

    let mut projected: BTreeMap<CellId, MultiPolygon<f64>> = BTreeMap::new();
    let mut areas = AreaIndex::new();
    for (code, frame, region_geom) in &framed_regions {
        let candidates = match frame {
            Some(rect) => engine.candidates_near(&to_multi(rect.to_polygon()), &index),
            None => Vec::new(),
        };
        let mut hits = 0usize;
        for &cell in &candidates {
            let Ok(pos) = cells.binary_search_by_key(&cell, |(cid, _)| *cid) else {
                continue;
            };
            let cell_geom = match projected.entry(cell) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let geom = engine
                        .transform(&to_multi(cells[pos].1.clone()), proj.grid_srid, proj.area_srid)
                        .map_err(|err| with_context(err, format!("grid cell {cell}")))?;
                    e.insert(geom)
                }
            };
            let area = engine.intersection_area(region_geom, cell_geom);
            if area > 0.0 {
                areas.insert(code, cell, area)?;
                hits += 1;
            }
        }
        tracing::debug!(region = %code, candidates = candidates.len(), hits, "region overlaps");
    }
    tracing::debug!(projected = projected.len(), "grid cells projected");

    Ok(areas)
}

/// Envelope of `region` expressed in `srid`. The region's envelope outline
/// is densified before transforming so curved edges stay inside the frame.
fn search_frame<E: SpatialEngine>(engine: &E, region: &Region, srid: Srid) -> Result<Option<Rect<f64>>> {
    let Some(env) = region.geometry.bounding_rect() else {
        return Ok(None);
    };
    if region.srid == srid {
        return Ok(Some(env));
    }

    let (min, max) = (env.min(), env.max());
    let corners = [min, coord! { x: max.x, y: min.y }, max, coord! { x: min.x, y: max.y }];
    let mut ring = Vec::with_capacity(4 * FRAME_SEGMENTS + 1);
    for (k, &a) in corners.iter().enumerate() {
        let b = corners[(k + 1) % corners.len()];
        for i in 0..FRAME_SEGMENTS {
            let t = i as f64 / FRAME_SEGMENTS as f64;
            ring.push(coord! { x: a.x + t * (b.x - a.x), y: a.y + t * (b.y - a.y) });
        }
    }
    let outline = to_multi(Polygon::new(LineString::from(ring), vec![]));
    let framed = engine.transform(&outline, region.srid, srid)?;

    Ok(framed.bounding_rect().map(|r| {
        let pad_x = r.width() * FRAME_MARGIN;
        let pad_y = r.height() * FRAME_MARGIN;
        Rect::new(
            coord! { x: r.min().x - pad_x, y: r.min().y - pad_y },
            coord! { x: r.max().x + pad_x, y: r.max().y + pad_y },
        )
    }))
}

fn with_context(err: WindClassError, context: String) -> WindClassError {
    match err {
        WindClassError::SpatialQuery { context: inner, reason } => WindClassError::SpatialQuery {
            context: format!("{context}: {inner}"),
            reason,
        },
        other => other,
    }
}
