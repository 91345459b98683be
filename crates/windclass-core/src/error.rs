//! Error taxonomy for the classification pipeline.
//!
//! Geometry and configuration problems are fatal and abort the enclosing call.
//! Numerical trouble in the extrapolation stage is not an error at all: it is
//! reported as `NaN` in the output plus a warning event (see
//! [`crate::extrapolation::ExtrapolationReport`]).

use thiserror::Error;

use crate::area_index::RegionId;
use crate::grid::CellId;

#[derive(Debug, Error)]
pub enum WindClassError {
    /// Coordinate vector does not describe a uniform grid.
    #[error("invalid spacing along {axis}: {reason}")]
    InvalidSpacing { axis: Axis, reason: String },

    /// Unknown projection, failed transform or bad region/grid reference.
    #[error("spatial query failed for {context}: {reason}")]
    SpatialQuery { context: String, reason: String },

    /// Two tables that must stay index-aligned do not.
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("negative overlap area {area} for region {region}, cell {cell}")]
    NegativeArea {
        region: RegionId,
        cell: CellId,
        area: f64,
    },

    #[error("unknown power curve profile '{0}'")]
    UnknownProfile(String),

    #[error("unknown extrapolation method '{0}'")]
    UnknownMethod(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WindClassError {
    pub(crate) fn spatial(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpatialQuery {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Grid axis, used to say which coordinate vector was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

pub type Result<T> = std::result::Result<T, WindClassError>;
