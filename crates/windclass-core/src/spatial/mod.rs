//! Narrow spatial-engine seam: projection transforms, exact intersection
//! areas and envelope pruning. The overlap calculator only talks to
//! [`SpatialEngine`]; [`GeoEngine`] implements it on the `geo` crate.

pub mod index;
pub mod projection;

use geo::{Area, BooleanOps, BoundingRect, Intersects, MapCoords, MultiPolygon, Point, Polygon};

use crate::error::{Result, WindClassError};
use crate::grid::CellId;

pub use index::EnvelopeIndex;
pub use projection::{project, Srid};

pub trait SpatialEngine {
    /// Re-project every vertex of `geom` from one reference system to another.
    fn transform(&self, geom: &MultiPolygon<f64>, from: Srid, to: Srid) -> Result<MultiPolygon<f64>>;

    /// Area of the intersection of `a` and `b`, in the units of their
    /// (shared) projection. Zero when they do not overlap.
    fn intersection_area(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64;

    /// Candidate cells whose envelope touches the envelope of `geom`.
    fn candidates_near(&self, geom: &MultiPolygon<f64>, index: &EnvelopeIndex) -> Vec<CellId>;
}

/// [`SpatialEngine`] backed by `geo`'s boolean operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl SpatialEngine for GeoEngine {
    fn transform(&self, geom: &MultiPolygon<f64>, from: Srid, to: Srid) -> Result<MultiPolygon<f64>> {
        if from == to {
            return Ok(geom.clone());
        }
        // A footprint around the antipode has its vertices scattered over the
        // projection's outer rim; the projected polygon is meaningless.
        if from == Srid::Wgs84 {
            if let Some(antipode) = to.antipode() {
                if geom.intersects(&Point::from(antipode)) {
                    return Err(WindClassError::spatial(
                        format!("geometry in {from}"),
                        format!("footprint contains ({}, {}), the antipode of {to}", antipode.x, antipode.y),
                    ));
                }
            }
        }
        geom.try_map_coords(|c| project(c, from, to))
    }

    fn intersection_area(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
        match (a.bounding_rect(), b.bounding_rect()) {
            (Some(ra), Some(rb))
                if ra.min().x <= rb.max().x
                    && rb.min().x <= ra.max().x
                    && ra.min().y <= rb.max().y
                    && rb.min().y <= ra.max().y =>
            {
                a.intersection(b).unsigned_area()
            }
            _ => 0.0,
        }
    }

    fn candidates_near(&self, geom: &MultiPolygon<f64>, index: &EnvelopeIndex) -> Vec<CellId> {
        match geom.bounding_rect() {
            Some(rect) => index.query(&rect),
            None => Vec::new(),
        }
    }
}

/// Wrap a single polygon so it can go through the engine.
pub fn to_multi(poly: Polygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![poly])
}
