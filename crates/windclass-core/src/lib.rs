//! Area-weighted wind-resource classification.
//!
//! Pipeline: reanalysis winds are extrapolated to hub height and passed
//! through a regional power curve ([`production`]); a regular grid is
//! intersected with administrative regions ([`overlap`]) to give per-region
//! cell areas ([`area_index`]); per-cell utilisation is then grouped into
//! classes by region ([`classes`]).

pub mod area_index;
pub mod classes;
pub mod config;
pub mod error;
pub mod extrapolation;
pub mod grid;
pub mod overlap;
pub mod power_curve;
pub mod production;
pub mod spatial;

pub use area_index::{AreaIndex, GriddedAreas, RegionId};
pub use classes::{classify, site_areas_fractions, ClassLimits, ClassTables, SiteShare};
pub use config::RunConfig;
pub use error::{Result, WindClassError};
pub use extrapolation::ExtrapolationMethod;
pub use grid::{build_grid, CellId, Grid, GridShape};
pub use overlap::{compute_overlaps, Region};
pub use power_curve::PowerCurveProfile;
pub use production::{produce, ProductionOutput, ReanalysisUnit};
