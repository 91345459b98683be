//! Coordinate reference systems known to the pipeline.
//!
//! Only two projections matter here: WGS84 geographic coordinates, in which
//! reanalysis grids are published, and the ETRS89 Lambert azimuthal
//! equal-area projection used to measure areas over Europe. The LAEA
//! formulas are the ellipsoidal forms from EPSG Guidance Note 7-2 (method
//! 9820) on the GRS80 ellipsoid.

use std::sync::OnceLock;

use geo::{coord, Coord};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WindClassError};

// ── GRS80 / ETRS89-LAEA constants ─────────────────────────────────────────────

const GRS80_A: f64 = 6_378_137.0;
const GRS80_INV_F: f64 = 298.257_222_101;

const LAEA_LAT0_DEG: f64 = 52.0;
const LAEA_LON0_DEG: f64 = 10.0;
const LAEA_FALSE_EASTING: f64 = 4_321_000.0;
const LAEA_FALSE_NORTHING: f64 = 3_210_000.0;

/// Spatial reference identifier, restricted to the supported EPSG codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Srid {
    /// EPSG:4326, x = longitude, y = latitude, degrees.
    Wgs84,
    /// EPSG:3035, metres.
    EtrsLaea,
}

impl Srid {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            4326 => Ok(Srid::Wgs84),
            3035 => Ok(Srid::EtrsLaea),
            other => Err(WindClassError::spatial(
                format!("SRID {other}"),
                "unsupported projection (expected 4326 or 3035)",
            )),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Srid::Wgs84 => 4326,
            Srid::EtrsLaea => 3035,
        }
    }

    /// Geographic lon/lat point this projection cannot represent, if any.
    pub fn antipode(self) -> Option<Coord<f64>> {
        match self {
            Srid::Wgs84 => None,
            Srid::EtrsLaea => Some(coord! { x: LAEA_LON0_DEG - 180.0, y: -LAEA_LAT0_DEG }),
        }
    }

    /// Convert a coordinate in this system to geographic lon/lat degrees.
    fn to_geographic(self, c: Coord<f64>) -> Result<Coord<f64>> {
        match self {
            Srid::Wgs84 => Ok(c),
            Srid::EtrsLaea => Ok(etrs_laea().inverse(c)),
        }
    }

    fn geographic_into(self, c: Coord<f64>) -> Result<Coord<f64>> {
        match self {
            Srid::Wgs84 => Ok(c),
            Srid::EtrsLaea => etrs_laea().forward(c),
        }
    }
}

impl TryFrom<u32> for Srid {
    type Error = WindClassError;

    fn try_from(code: u32) -> Result<Self> {
        Srid::from_code(code)
    }
}

impl From<Srid> for u32 {
    fn from(srid: Srid) -> u32 {
        srid.code()
    }
}

impl std::fmt::Display for Srid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.code())
    }
}

/// Transform a single coordinate between two reference systems.
pub fn project(c: Coord<f64>, from: Srid, to: Srid) -> Result<Coord<f64>> {
    if from == to {
        return Ok(c);
    }
    let geographic = from.to_geographic(c)?;
    to.geographic_into(geographic)
}

// ── Lambert azimuthal equal-area (ellipsoidal) ────────────────────────────────

struct Laea {
    e: f64,
    e2: f64,
    lon0: f64,
    qp: f64,
    rq: f64,
    d: f64,
    sin_beta0: f64,
    cos_beta0: f64,
}

fn etrs_laea() -> &'static Laea {
    static LAEA: OnceLock<Laea> = OnceLock::new();
    LAEA.get_or_init(Laea::etrs89)
}

impl Laea {
    fn etrs89() -> Self {
        let f = 1.0 / GRS80_INV_F;
        let e2 = 2.0 * f - f * f;
        let e = e2.sqrt();
        let lat0 = LAEA_LAT0_DEG.to_radians();
        let qp = q_of(std::f64::consts::FRAC_PI_2, e, e2);
        let beta0 = (q_of(lat0, e, e2) / qp).asin();
        let rq = GRS80_A * (qp / 2.0).sqrt();
        let d = GRS80_A * (lat0.cos() / (1.0 - e2 * lat0.sin().powi(2)).sqrt()) / (rq * beta0.cos());
        Self {
            e,
            e2,
            lon0: LAEA_LON0_DEG.to_radians(),
            qp,
            rq,
            d,
            sin_beta0: beta0.sin(),
            cos_beta0: beta0.cos(),
        }
    }

    /// lon/lat degrees → easting/northing metres.
    fn forward(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let p = self;
        let lat = c.y.to_radians();
        let dlon = c.x.to_radians() - p.lon0;
        let beta = (q_of(lat, p.e, p.e2) / p.qp).clamp(-1.0, 1.0).asin();

        let denom = 1.0 + p.sin_beta0 * beta.sin() + p.cos_beta0 * beta.cos() * dlon.cos();
        if denom <= f64::EPSILON {
            return Err(WindClassError::spatial(
                format!("point ({}, {})", c.x, c.y),
                "antipode of the EPSG:3035 projection centre",
            ));
        }
        let b = p.rq * (2.0 / denom).sqrt();

        Ok(coord! {
            x: LAEA_FALSE_EASTING + b * p.d * beta.cos() * dlon.sin(),
            y: LAEA_FALSE_NORTHING + (b / p.d) * (p.cos_beta0 * beta.sin() - p.sin_beta0 * beta.cos() * dlon.cos()),
        })
    }

    /// easting/northing metres → lon/lat degrees.
    fn inverse(&self, c: Coord<f64>) -> Coord<f64> {
        let p = self;
        let de = c.x - LAEA_FALSE_EASTING;
        let dn = c.y - LAEA_FALSE_NORTHING;
        let rho = ((de / p.d).powi(2) + (p.d * dn).powi(2)).sqrt();
        if rho < 1e-9 {
            return coord! { x: LAEA_LON0_DEG, y: LAEA_LAT0_DEG };
        }

        let cc = 2.0 * (rho / (2.0 * p.rq)).clamp(-1.0, 1.0).asin();
        let beta = (cc.cos() * p.sin_beta0 + p.d * dn * cc.sin() * p.cos_beta0 / rho)
            .clamp(-1.0, 1.0)
            .asin();
        let lon = p.lon0
            + (de * cc.sin()).atan2(
                p.d * rho * p.cos_beta0 * cc.cos() - p.d * p.d * dn * p.sin_beta0 * cc.sin(),
            );

        let e4 = p.e2 * p.e2;
        let e6 = e4 * p.e2;
        let lat = beta
            + (p.e2 / 3.0 + 31.0 * e4 / 180.0 + 517.0 * e6 / 5040.0) * (2.0 * beta).sin()
            + (23.0 * e4 / 360.0 + 251.0 * e6 / 3780.0) * (4.0 * beta).sin()
            + (761.0 * e6 / 45360.0) * (6.0 * beta).sin();

        coord! { x: lon.to_degrees(), y: lat.to_degrees() }
    }
}

/// Authalic `q` function.
fn q_of(phi: f64, e: f64, e2: f64) -> f64 {
    let s = phi.sin();
    (1.0 - e2) * (s / (1.0 - e2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln())
}
